use clap::Args;
use parapheur_core::ActingUser;
use parapheur_db::WorkflowService;

use crate::commands::{classify_service_error, resolve_reference, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct CancelArgs {
    #[arg(help = "Request reference, e.g. CRD/2026/0001")]
    pub reference: String,
    #[arg(long, help = "User id of the requester")]
    pub user: String,
    #[arg(long, help = "Display name used in the audit trail")]
    pub name: Option<String>,
}

pub fn run(args: CancelArgs) -> CommandResult {
    with_pool("cancel", |pool, _config| async move {
        let request = resolve_reference(&pool, &args.reference).await?;
        let service = WorkflowService::new(pool);

        let actor = ActingUser::new(args.user.clone(), args.name.unwrap_or(args.user));
        let state = service.cancel(&request.id, &actor).await.map_err(classify_service_error)?;
        Ok(format!("cancelled {}: state {state:?}", args.reference))
    })
}
