use super::{ActionError, Handler};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

pub struct TextSorter;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct TextLines {
    pub lines: Vec<String>,
}

#[async_trait]
impl Handler for TextSorter {
    type Params = TextLines;

    fn name(&self) -> &'static str {
        "TextSorter"
    }

    fn description(&self) -> &'static str {
        "sorts lines of text in lexical order."
    }

    async fn run(&self, params: &TextLines) -> Result<String, ActionError> {
        let mut lines = params.lines.clone();
        lines.sort();
        pretty(&lines)
    }
}

pub struct NumberSorter;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NumberLines {
    pub lines: Vec<f64>,
}

#[async_trait]
impl Handler for NumberSorter {
    type Params = NumberLines;

    fn name(&self) -> &'static str {
        "NumberSorter"
    }

    fn description(&self) -> &'static str {
        "sorts numbers."
    }

    async fn run(&self, params: &NumberLines) -> Result<String, ActionError> {
        let mut numbers = params.lines.clone();
        numbers.sort_by(f64::total_cmp);
        let numbers: Vec<Value> = numbers.into_iter().map(plain_number).collect();
        pretty(&numbers)
    }
}

/// Whole numbers print without a fraction: `2`, not `2.0`
fn plain_number(n: f64) -> Value {
    n.to_string()
        .parse::<serde_json::Number>()
        .map_or(Value::Null, Value::Number)
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String, ActionError> {
    serde_json::to_string_pretty(value).map_err(|e| ActionError::Failed(e.to_string()))
}
