//! Arithmetic actions

use super::{ActionError, Handler};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

pub struct SummationRequest;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct SummationParams {
    /// Numbers to add
    pub summands: Vec<f64>,
}

#[async_trait]
impl Handler for SummationRequest {
    type Params = SummationParams;

    fn name(&self) -> &'static str {
        "SummationRequest"
    }

    fn description(&self) -> &'static str {
        "adds numbers together."
    }

    async fn run(&self, params: &SummationParams) -> Result<String, ActionError> {
        let sum = params.summands.iter().fold(0.0_f64, |acc, x| acc + x);
        Ok(format!("{sum:.6}"))
    }
}

pub struct ProductRequest;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ProductParams {
    /// Numbers to multiply
    pub factors: Vec<f64>,
}

#[async_trait]
impl Handler for ProductRequest {
    type Params = ProductParams;

    fn name(&self) -> &'static str {
        "ProductRequest"
    }

    fn description(&self) -> &'static str {
        "multiplies numbers together."
    }

    async fn run(&self, params: &ProductParams) -> Result<String, ActionError> {
        Ok(format!("{:.6}", params.factors.iter().product::<f64>()))
    }
}

pub struct SquareRoot;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct SquareRootParams {
    pub argument: f64,
}

#[async_trait]
impl Handler for SquareRoot {
    type Params = SquareRootParams;

    fn name(&self) -> &'static str {
        "SquareRoot"
    }

    fn description(&self) -> &'static str {
        "takes the square root of a number."
    }

    async fn run(&self, params: &SquareRootParams) -> Result<String, ActionError> {
        Ok(format!("{:.6}", params.argument.sqrt()))
    }
}
