use clap::Args;
use parapheur_db::WorkflowService;

use crate::commands::{classify_service_error, resolve_reference, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Request reference, e.g. CRD/2026/0001")]
    pub reference: String,
}

pub fn run(args: ShowArgs) -> CommandResult {
    with_pool("show", |pool, _config| async move {
        let request = resolve_reference(&pool, &args.reference).await?;
        let service = WorkflowService::new(pool);
        let detail = service.show(&request.id).await.map_err(classify_service_error)?;

        let mut lines = vec![
            format!("{} [{:?}] {}", detail.request.reference, detail.request.state,
                detail.request.subject),
            format!("  requester: {}", detail.request.requester.0),
        ];
        if let Some(circuit) = &detail.request.circuit_id {
            lines.push(format!("  circuit: {}", circuit.0));
        }

        lines.push(format!("  approvals ({}):", detail.approvals.len()));
        for approval in &detail.approvals {
            lines.push(format!(
                "    - level {} / {}: {:?}",
                approval.level_sequence, approval.approver.0, approval.state,
            ));
        }

        if !detail.comments.is_empty() {
            lines.push(format!("  comments ({}):", detail.comments.len()));
            for comment in &detail.comments {
                lines.push(format!(
                    "    - [{}] {} ({}): {}",
                    comment.exchange_number,
                    comment.subject.as_deref().unwrap_or("-"),
                    comment.author.0,
                    comment.message,
                ));
            }
        }

        if !detail.documents.is_empty() {
            lines.push(format!("  documents ({}):", detail.documents.len()));
            for document in &detail.documents {
                let token = document.access_token.as_deref().unwrap_or("no token yet");
                lines.push(format!("    - {} ({})", document.name, token));
            }
        }

        Ok(lines.join("\n"))
    })
}
