use rand::seq::SliceRandom;
use rand::Rng;

use crate::database::store::EntityStore;
use crate::error::Result;
use crate::models::module::Module;
use crate::models::question::Question;

/// Questions of one subject together with how many of them a module asks for.
#[derive(Debug, Clone)]
pub struct SubjectPool {
    pub quota: usize,
    pub questions: Vec<Question>,
}

/// Draws an attempt's questions from per-subject pools, in pool order.
///
/// Each pool is shuffled when `randomize` is set and then cut to its quota; a short pool
/// contributes what it has. With `randomize` the combined list is shuffled once more so
/// subject order does not leak.
pub fn pick_questions<R: Rng + ?Sized>(
    pools: Vec<SubjectPool>,
    randomize: bool,
    rng: &mut R,
) -> Vec<Question> {
    let mut selected = Vec::new();
    for SubjectPool { quota, mut questions } in pools {
        if randomize {
            questions.shuffle(rng);
        }
        questions.truncate(quota);
        selected.extend(questions);
    }
    if randomize {
        selected.shuffle(rng);
    }
    selected
}

/// Loads the module's subject pools in configuration order and picks from them.
pub async fn select_questions<S, R>(store: &mut S, module: &Module, rng: &mut R) -> Result<Vec<Question>>
where
    S: EntityStore + ?Sized,
    R: Rng + Send + ?Sized,
{
    let configs = store.subject_configs(module.id).await?;
    let mut pools = Vec::with_capacity(configs.len());
    for config in configs {
        let questions = store.questions_for_subject(config.subject_id).await?;
        pools.push(SubjectPool {
            quota: usize::try_from(config.question_count).unwrap_or(0),
            questions,
        });
    }
    Ok(pick_questions(pools, module.randomize, rng))
}
