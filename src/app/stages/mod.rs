pub mod build;
pub mod checkout;
pub mod deploy;
pub mod scan;
pub mod skip_check;

pub use build::BuildStage;
pub use checkout::CheckoutStage;
pub use deploy::DeployStage;
pub use scan::ScanStage;
pub use skip_check::SkipCheckStage;
pub use test::TestStage;

use crate::core::PipelineContext;

/// 沒有對應環境的分支只跑到 test
pub(crate) fn environment_gate(context: &PipelineContext) -> Option<String> {
    match context.environment {
        Some(_) => None,
        None => Some(format!(
            "branch '{}' has no deployment environment",
            context.trigger.branch
        )),
    }
}
