//! Maps transport errors to the driver taxonomy.

use quarry_proto::ErrorInfo;
use quarry_proto::rpc::decode_error_info;

use crate::error::{DriverError, SQLSTATE_GENERIC, ServerDiagnostic, is_cancelled};
use crate::session::SessionConfig;

/// Query text beyond this length is truncated in error renderings.
pub const MAX_QUERY_TEXT_BYTES: usize = 16 * 1024;
const TRUNCATION_MARKER: &str = "<truncated>";

/// Context available to error rendering at a given call site.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext<'a> {
    pub sql: Option<&'a str>,
    pub query_id: Option<&'a str>,
}

impl<'a> ErrorContext<'a> {
    pub fn with_query_id(query_id: Option<&'a str>) -> Self {
        Self {
            sql: None,
            query_id,
        }
    }
}

/// Classifies a failed call.
///
/// CANCELLED maps to [`DriverError::StreamCancelled`] (never expected here;
/// the call sites that may absorb a cancellation decide that themselves).
/// A structured server payload yields [`DriverError::Server`] with the three
/// renderings; anything else passes through as a transport error.
pub fn classify(status: tonic::Status, context: &ErrorContext, config: &SessionConfig) -> DriverError {
    if is_cancelled(&status) {
        return DriverError::StreamCancelled { expected: false };
    }
    match decode_error_info(status.details()) {
        Some(info) => DriverError::Server(Box::new(render_diagnostic(&info, context, config))),
        None => {
            if status.message().is_empty() && status.details().is_empty() {
                return DriverError::Transport(status);
            }
            let info = ErrorInfo {
                sqlstate: SQLSTATE_GENERIC.into(),
                primary_message: status.message().to_string(),
                ..Default::default()
            };
            DriverError::Server(Box::new(render_diagnostic(&info, context, config)))
        }
    }
}

fn render_diagnostic(
    info: &ErrorInfo,
    context: &ErrorContext,
    config: &SessionConfig,
) -> ServerDiagnostic {
    let sqlstate = if info.sqlstate.is_empty() {
        SQLSTATE_GENERIC.to_string()
    } else {
        info.sqlstate.clone()
    };

    let mut core = format!(
        "Failed to execute query: {}\nSQLSTATE: {}",
        info.primary_message, sqlstate
    );
    if let Some(query_id) = context.query_id {
        core.push_str(&format!("\nQUERY-ID: {query_id}"));
    }

    let mut customer_sections = format!(
        "\nDETAIL: {}\nHINT: {}",
        info.customer_detail, info.customer_hint
    );
    customer_sections.push_str(&format!(
        "\nQUERY: {}",
        truncate_query_text(context.sql.unwrap_or(""))
    ));

    let reason = if config.include_customer_detail_in_reason {
        format!("{core}{customer_sections}")
    } else {
        core.clone()
    };
    let customer_message = format!("{core}{customer_sections}");
    let system_message = format!("{customer_message}\nSYSTEM-DETAIL: {}", info.system_detail);

    ServerDiagnostic {
        sqlstate,
        primary_message: info.primary_message.clone(),
        customer_detail: info.customer_detail.clone(),
        customer_hint: info.customer_hint.clone(),
        system_detail: info.system_detail.clone(),
        query_id: context.query_id.map(str::to_string),
        reason,
        customer_message,
        system_message,
    }
}

/// Truncates query text at 16 KiB, on a char boundary, with a marker.
pub fn truncate_query_text(sql: &str) -> String {
    if sql.len() <= MAX_QUERY_TEXT_BYTES {
        return sql.to_string();
    }
    let mut cut = MAX_QUERY_TEXT_BYTES;
    while !sql.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &sql[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use quarry_proto::rpc::{Any, RpcStatus};

    fn status_with_info(info: &ErrorInfo) -> tonic::Status {
        let details = RpcStatus {
            code: 3,
            message: info.primary_message.clone(),
            details: vec![Any {
                type_url: ErrorInfo::TYPE_URL.into(),
                value: info.encode_to_vec(),
            }],
        }
        .encode_to_vec();
        tonic::Status::with_details(
            tonic::Code::InvalidArgument,
            info.primary_message.clone(),
            details.into(),
        )
    }

    fn sample_info() -> ErrorInfo {
        ErrorInfo {
            sqlstate: "42601".into(),
            primary_message: "syntax error at or near \"FORM\"".into(),
            customer_detail: "the statement could not be parsed".into(),
            customer_hint: "check the statement near position 10".into(),
            system_detail: "parser state 7".into(),
        }
    }

    #[test]
    fn renders_all_three_messages() {
        let context = ErrorContext {
            sql: Some("SELECT * FORM t"),
            query_id: Some("q-123"),
        };
        let err = classify(
            status_with_info(&sample_info()),
            &context,
            &SessionConfig::default(),
        );
        let DriverError::Server(diag) = err else {
            panic!("expected server error");
        };
        assert_eq!(diag.sqlstate, "42601");
        assert!(diag.reason.starts_with(
            "Failed to execute query: syntax error at or near \"FORM\"\nSQLSTATE: 42601\nQUERY-ID: q-123"
        ));
        assert!(diag.reason.contains("\nDETAIL: the statement could not be parsed"));
        assert!(diag.customer_message.contains("\nHINT: check the statement near position 10"));
        assert!(diag.customer_message.contains("\nQUERY: SELECT * FORM t"));
        assert!(!diag.customer_message.contains("SYSTEM-DETAIL"));
        assert!(diag.system_message.ends_with("\nSYSTEM-DETAIL: parser state 7"));
    }

    #[test]
    fn reason_respects_customer_detail_option() {
        let config = SessionConfig {
            include_customer_detail_in_reason: false,
            ..Default::default()
        };
        let context = ErrorContext {
            sql: Some("SELECT * FORM t"),
            query_id: None,
        };
        let err = classify(status_with_info(&sample_info()), &context, &config);
        let DriverError::Server(diag) = err else {
            panic!("expected server error");
        };
        assert!(!diag.reason.contains("DETAIL"));
        assert!(diag.customer_message.contains("DETAIL"));
    }

    #[test]
    fn unstructured_status_falls_back_to_generic_sqlstate() {
        let status = tonic::Status::internal("boom");
        let err = classify(status, &ErrorContext::default(), &SessionConfig::default());
        let DriverError::Server(diag) = err else {
            panic!("expected server error");
        };
        assert_eq!(diag.sqlstate, SQLSTATE_GENERIC);
        assert!(diag.reason.starts_with("Failed to execute query: boom"));
    }

    #[test]
    fn cancelled_maps_to_stream_cancelled() {
        let err = classify(
            tonic::Status::cancelled("gone"),
            &ErrorContext::default(),
            &SessionConfig::default(),
        );
        assert!(matches!(
            err,
            DriverError::StreamCancelled { expected: false }
        ));
    }

    #[test]
    fn long_query_text_is_truncated() {
        let long_sql = "x".repeat(MAX_QUERY_TEXT_BYTES + 100);
        let truncated = truncate_query_text(&long_sql);
        assert_eq!(
            truncated.len(),
            MAX_QUERY_TEXT_BYTES + TRUNCATION_MARKER.len()
        );
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        // multi-byte chars are not split
        let multibyte = "é".repeat(MAX_QUERY_TEXT_BYTES);
        let truncated = truncate_query_text(&multibyte);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }
}
