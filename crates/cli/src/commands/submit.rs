use clap::Args;
use parapheur_core::ActingUser;
use parapheur_db::WorkflowService;

use crate::commands::{classify_service_error, resolve_reference, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[arg(help = "Request reference, e.g. CRD/2026/0001")]
    pub reference: String,
    #[arg(long, help = "User id of the requester")]
    pub user: String,
    #[arg(long, help = "Display name used in the audit trail")]
    pub name: Option<String>,
}

pub fn run(args: SubmitArgs) -> CommandResult {
    with_pool("submit", |pool, config| async move {
        let request = resolve_reference(&pool, &args.reference).await?;
        let service = WorkflowService::new(pool)
            .with_reference_fallback(config.workflow.fallback_reference_code.clone());

        let actor = ActingUser::new(args.user.clone(), args.name.unwrap_or(args.user));
        let outcome =
            service.submit(&request.id, &actor).await.map_err(classify_service_error)?;
        Ok(format!(
            "submitted {}: {} approvals created, state {:?}",
            args.reference,
            outcome.created.len(),
            outcome.request_state,
        ))
    })
}
