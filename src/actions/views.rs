use super::{ActionError, Handler};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

/// Word-count heuristic for video popularity
pub struct YoutubeViewModel;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct VideoParams {
    pub video_title: String,
    pub video_description: String,
}

#[async_trait]
impl Handler for YoutubeViewModel {
    type Params = VideoParams;

    fn name(&self) -> &'static str {
        "YoutubeViewModel"
    }

    fn description(&self) -> &'static str {
        "predicts how many views a youtube video will get, based on the title and description."
    }

    async fn run(&self, params: &VideoParams) -> Result<String, ActionError> {
        let title_words = word_count(&params.video_title)?;
        let description_words = word_count(&params.video_description)?;
        let views = (10.0 + description_words.ln() - title_words.ln()).exp();
        Ok(format!("{views:.0} views predicted"))
    }
}

fn word_count(text: &str) -> Result<f64, ActionError> {
    match text.split_whitespace().count() {
        0 => Err(ActionError::Failed(
            "title and description must both contain words".to_string(),
        )),
        #[allow(clippy::cast_precision_loss)]
        n => Ok(n as f64),
    }
}
