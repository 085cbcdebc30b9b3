use clap::Args;
use parapheur_core::{ActingUser, DecisionAction};
use parapheur_db::WorkflowService;

use crate::commands::{classify_service_error, resolve_reference, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct DecideArgs {
    #[arg(help = "Request reference, e.g. CRD/2026/0001")]
    pub reference: String,
    #[arg(long, help = "Decision: approve, reject or return")]
    pub action: String,
    #[arg(long, help = "User id of the deciding approver")]
    pub user: String,
    #[arg(long, help = "Display name used in the audit trail")]
    pub name: Option<String>,
    #[arg(long, help = "Mandatory decision comment")]
    pub comment: String,
}

pub fn run(args: DecideArgs) -> CommandResult {
    let action = match parse_action(&args.action) {
        Ok(action) => action,
        Err(message) => return CommandResult::failure("decide", "invalid_argument", message, 2),
    };

    with_pool("decide", |pool, config| async move {
        let request = resolve_reference(&pool, &args.reference).await?;
        let service = WorkflowService::new(pool)
            .with_reference_fallback(config.workflow.fallback_reference_code.clone());

        let actor = ActingUser::new(args.user.clone(), args.name.unwrap_or(args.user));
        let outcome = service
            .decide(&request.id, None, action, &args.comment, &actor)
            .await
            .map_err(classify_service_error)?;
        Ok(format!(
            "recorded {} on {}: request state {:?}",
            args.action.to_ascii_lowercase(),
            args.reference,
            outcome.request_state,
        ))
    })
}

fn parse_action(value: &str) -> Result<DecisionAction, String> {
    match value.to_ascii_lowercase().as_str() {
        "approve" => Ok(DecisionAction::Approve),
        "reject" => Ok(DecisionAction::Reject),
        "return" => Ok(DecisionAction::Return),
        other => Err(format!("`{other}` is not a decision (approve, reject, return)")),
    }
}
