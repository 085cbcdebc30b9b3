use clap::Args;
use parapheur_core::UserId;
use parapheur_db::WorkflowService;

use crate::commands::{classify_service_error, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct InboxArgs {
    #[arg(long, help = "User id whose pending approvals to list")]
    pub user: String,
}

pub fn run(args: InboxArgs) -> CommandResult {
    with_pool("inbox", |pool, _config| async move {
        let service = WorkflowService::new(pool);
        let items =
            service.inbox(&UserId(args.user.clone())).await.map_err(classify_service_error)?;

        if items.is_empty() {
            return Ok(format!("no pending approvals for {}", args.user));
        }

        let mut lines = vec![format!("{} pending approval(s) for {}:", items.len(), args.user)];
        for item in items {
            lines.push(format!(
                "  - {} (level {}): {}",
                item.reference, item.approval.level_sequence, item.subject,
            ));
        }
        Ok(lines.join("\n"))
    })
}
