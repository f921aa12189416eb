use super::{ActionError, Handler, NoParams};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::PathBuf;

/// Picks a random line of a jokes file
pub struct RandomJoke {
    path: PathBuf,
}

impl RandomJoke {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Handler for RandomJoke {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        "RandomJoke"
    }

    fn description(&self) -> &'static str {
        "fetches a random joke"
    }

    async fn run(&self, _params: &NoParams) -> Result<String, ActionError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let jokes: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.replace("<>", " ... "))
            .collect();

        jokes
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ActionError::Failed(format!("no jokes in {}", self.path.display())))
    }
}
