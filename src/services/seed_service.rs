use sqlx::PgPool;

use crate::database::pg_store::PgStore;
use crate::database::store::EntityStore;
use crate::error::{Error, Result};
use crate::models::group::GroupDraft;
use crate::models::module::{ModuleDraft, ModuleSettings};
use crate::models::question::QuestionDraft;
use crate::models::subject::SubjectDraft;
use crate::models::user::{Role, UserDraft};
use crate::services::sync_service::PasswordHasher;
use crate::utils::crypto::hash_password;

const SEED_PASSWORD: &str = "123";

const LIVE_QUESTIONS: [(&str, [&str; 4], i64); 5] = [
    ("Guanash bo'yog'i qanday asosga ega?", ["Suv", "Moy", "Sirt", "Lola"], 0),
    ("Kompozitsiya qonuniyatlariga nima kirmaydi?", ["Yaxlitlik", "Mantiqsizlik", "Kontrast", "Muvozanat"], 1),
    ("Asosiy ranglar necha xil?", ["2 ta", "3 ta", "5 ta", "7 ta"], 1),
    ("Akvarel texnikasida eng muhim vosita nima?", ["Loyiha", "Qalam", "Suv", "Yog'"], 2),
    ("Portret janri nimani tasvirlaydi?", ["Tabiatni", "Hayvonlarni", "Insonni", "Binolarni"], 2),
];

const DEMO_QUESTIONS: [(&str, [&str; 4], i64); 3] = [
    ("Sariq va ko'k aralashsa qaysi rang hosil bo'ladi?", ["Yashil", "Qizil", "Binafsha", "Qora"], 0),
    ("Kontrast nimani anglatadi?", ["Bir xil ranglar", "Farqli elementlar kuchi", "Faqat qora rang", "Faqat oq rang"], 1),
    ("Kompozitsiyada muvozanat nima?", ["Tasodifiy joylashuv", "Elementlar uyg'unligi", "Faqat markaz", "Rangsizlik"], 1),
];

/// Seeds one demo cohort unless an `admin` account already exists.
/// Returns whether anything was written.
pub async fn seed_demo<S>(store: &mut S, hash: PasswordHasher) -> Result<bool>
where
    S: EntityStore + ?Sized,
{
    if store.find_user_by_username("admin").await?.is_some() {
        return Ok(false);
    }

    let group = store
        .insert_group(&GroupDraft {
            name: "Tasviriy San'at - 2024-01".to_string(),
            is_archived: false,
        })
        .await?;
    let subject = store
        .insert_subject(&SubjectDraft {
            name: "Tasviriy San'at Nazariyasi".to_string(),
            is_demo: false,
        })
        .await?;
    let demo_subject = store
        .insert_subject(&SubjectDraft {
            name: "Demo: Tasviriy San'at Nazariyasi".to_string(),
            is_demo: true,
        })
        .await?;

    let module = store
        .insert_module(&ModuleDraft {
            name: "Rangtasvir va Kompozitsiya".to_string(),
            is_demo: false,
            settings: ModuleSettings {
                points_per_answer: 5,
                duration_minutes: 10,
                passing_score: 15,
                randomize: true,
                is_active: true,
            },
        })
        .await?;
    store.set_module_groups(module.id, &[group.id]).await?;
    store.replace_subject_configs(module.id, &[(subject.id, 5)]).await?;

    let demo_module = store
        .insert_module(&ModuleDraft {
            name: "Demo: Ranglar asoslari".to_string(),
            is_demo: true,
            settings: ModuleSettings {
                points_per_answer: 5,
                duration_minutes: 8,
                passing_score: 10,
                randomize: true,
                is_active: true,
            },
        })
        .await?;
    store.set_module_groups(demo_module.id, &[group.id]).await?;
    store.replace_subject_configs(demo_module.id, &[(demo_subject.id, 3)]).await?;

    let questions = LIVE_QUESTIONS
        .iter()
        .map(|q| (subject.id, q))
        .chain(DEMO_QUESTIONS.iter().map(|q| (demo_subject.id, q)));
    for (subject_id, (text, options, correct_index)) in questions {
        let draft = QuestionDraft::new(
            subject_id,
            text.to_string(),
            options.iter().map(|o| o.to_string()).collect(),
            *correct_index,
        )
        .ok_or_else(|| Error::Internal(format!("invalid seed question: {}", text)))?;
        store.insert_question(&draft).await?;
    }

    let password = hash(SEED_PASSWORD)?;
    let accounts = [
        ("admin", "Admin User", "Markaz", Role::Admin, None),
        ("manager", "Menejer Bekzod", "Markaz", Role::Manager, None),
        ("tinglovchi", "Ali Valiyev", "Maktab 1", Role::Participant, Some(group.id)),
    ];
    for (username, full_name, workplace, role, group_id) in accounts {
        store
            .insert_user(
                &UserDraft {
                    username: username.to_string(),
                    full_name: full_name.to_string(),
                    workplace: workplace.to_string(),
                    role,
                    group_id,
                    is_active: true,
                },
                Some(&password),
            )
            .await?;
    }

    Ok(true)
}

pub async fn seed_demo_data(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;
    let seeded = seed_demo(&mut PgStore::new(&mut *tx), hash_password).await?;
    tx.commit().await?;
    if seeded {
        tracing::info!("demo data seeded");
    } else {
        tracing::warn!("seed already exists, skipping");
    }
    Ok(())
}
