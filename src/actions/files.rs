use super::{ActionError, Handler};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

pub struct FileCreation;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct FileCreationParams {
    pub filename: String,
    #[serde(rename = "UTF8Content")]
    pub utf8_content: String,
}

#[async_trait]
impl Handler for FileCreation {
    type Params = FileCreationParams;

    fn name(&self) -> &'static str {
        "FileCreation"
    }

    fn description(&self) -> &'static str {
        "creates a file with given name and content, which is better than echo'ing or redirecting into a file because it can handle special characters, line newline escapes etc."
    }

    async fn run(&self, params: &FileCreationParams) -> Result<String, ActionError> {
        tokio::fs::write(&params.filename, params.utf8_content.as_bytes()).await?;
        tracing::info!(file = %params.filename, bytes = params.utf8_content.len(), "Created file");
        Ok(format!(
            "created file {:?} with {} bytes content",
            params.filename,
            params.utf8_content.len()
        ))
    }
}
