use portfolio_mc_core::pipeline::invoke_aggregate;
use portfolio_mc_core::types::InvocationResult;

use super::Workspace;

pub fn run_combine(ws: &Workspace) -> Result<InvocationResult, Box<dyn std::error::Error>> {
    Ok(invoke_aggregate(&ws.objects, &ws.metadata, &ws.config))
}
