//! Status documents exchanged with the asynchronous API.
//!
//! Field names follow the service's camelCase XML elements verbatim.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::types::{BatchState, ConcurrencyMode, ContentType, JobState, Operation};
use crate::xml::{element_text, XmlBuilder};

/// Job status (`jobInfo`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: Option<String>,
    pub operation: Option<Operation>,
    pub object: Option<String>,
    pub created_by_id: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub system_modstamp: Option<DateTime<Utc>>,
    pub state: Option<JobState>,
    pub external_id_field_name: Option<String>,
    pub concurrency_mode: Option<ConcurrencyMode>,
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub number_batches_queued: u64,
    #[serde(default)]
    pub number_batches_in_progress: u64,
    #[serde(default)]
    pub number_batches_completed: u64,
    #[serde(default)]
    pub number_batches_failed: u64,
    #[serde(default)]
    pub number_batches_total: u64,
    #[serde(default)]
    pub number_records_processed: u64,
    #[serde(default)]
    pub number_retries: u64,
    pub api_version: Option<String>,
    pub assignment_rule_id: Option<String>,
    #[serde(default)]
    pub number_records_failed: u64,
    #[serde(default)]
    pub total_processing_time: u64,
    #[serde(default)]
    pub api_active_processing_time: u64,
    #[serde(default)]
    pub apex_processing_time: u64,
}

impl JobInfo {
    pub(crate) fn parse(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

/// Batch status (`batchInfo`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
    pub state: Option<BatchState>,
    pub state_message: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub system_modstamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub number_records_processed: u64,
    #[serde(default)]
    pub number_records_failed: u64,
    #[serde(default)]
    pub total_processing_time: u64,
    #[serde(default)]
    pub api_active_processing_time: u64,
    #[serde(default)]
    pub apex_processing_time: u64,
}

impl BatchInfo {
    pub(crate) fn parse(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

#[derive(Debug, Default, Deserialize)]
struct BatchInfoList {
    #[serde(rename = "batchInfo", default)]
    batch_info: Vec<BatchInfo>,
}

/// Parse a `batchInfoList` document.
pub(crate) fn parse_batch_info_list(xml: &str) -> Result<Vec<BatchInfo>> {
    let list: BatchInfoList = quick_xml::de::from_str(xml)?;
    Ok(list.batch_info)
}

#[derive(Debug, Default, Deserialize)]
struct ResultList {
    #[serde(rename = "result", default)]
    result: Vec<String>,
}

/// Parse a query batch's `result-list` of result ids.
pub(crate) fn parse_result_list(xml: &str) -> Result<Vec<String>> {
    let list: ResultList = quick_xml::de::from_str(xml)?;
    Ok(list
        .result
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Error code and message carried by a failure response.
///
/// Understands the async API `error` document and SOAP faults.
pub(crate) fn error_details(body: &str) -> (Option<String>, Option<String>) {
    if let Some(message) = element_text(body, "exceptionMessage") {
        return (element_text(body, "exceptionCode"), Some(message));
    }
    if let Some(message) = element_text(body, "faultstring") {
        return (element_text(body, "faultcode"), Some(message));
    }
    (None, None)
}

// =============================================================================
// Request documents
// =============================================================================

/// Fields sent when creating a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JobDescriptor<'a> {
    pub operation: Operation,
    pub object: &'a str,
    pub external_id_field_name: Option<&'a str>,
    pub concurrency_mode: Option<ConcurrencyMode>,
    pub content_type: ContentType,
    pub assignment_rule_id: Option<&'a str>,
}

impl JobDescriptor<'_> {
    /// Serialize in the element order the service's schema requires.
    pub(crate) fn to_xml(&self) -> Result<String> {
        let mut builder = XmlBuilder::new()?.root("jobInfo")?;
        builder.element("operation", self.operation.as_str())?;
        builder.element("object", self.object)?;
        if let Some(field) = self.external_id_field_name {
            builder.element("externalIdFieldName", field)?;
        }
        if let Some(mode) = self.concurrency_mode {
            builder.element("concurrencyMode", mode.as_str())?;
        }
        builder.element("contentType", self.content_type.as_str())?;
        if let Some(rule) = self.assignment_rule_id {
            builder.element("assignmentRuleId", rule)?;
        }
        builder.end("jobInfo")?;
        builder.finish()
    }
}

/// A `jobInfo` document requesting a state change.
pub(crate) fn state_document(state: JobState) -> Result<String> {
    let mut builder = XmlBuilder::new()?.root("jobInfo")?;
    builder.element("state", state.as_str())?;
    builder.end("jobInfo")?;
    builder.finish()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_job_info() {
        let info = JobInfo::parse(&job_info("750D0000000002lIAA", "Open", 2, 1)).unwrap();
        assert_eq!(info.id.as_deref(), Some("750D0000000002lIAA"));
        assert_eq!(info.operation, Some(Operation::Insert));
        assert_eq!(info.object.as_deref(), Some("Account"));
        assert_eq!(info.state, Some(JobState::Open));
        assert_eq!(info.content_type, Some(ContentType::Csv));
        assert_eq!(info.concurrency_mode, Some(ConcurrencyMode::Parallel));
        assert_eq!(info.number_batches_queued, 2);
        assert_eq!(info.number_batches_in_progress, 1);
        assert_eq!(info.api_version.as_deref(), Some("62.0"));
        assert_eq!(info.created_by_id.as_deref(), Some("005D0000001ALVFIA4"));
        assert!(info.created_date.is_some());
    }

    #[test]
    fn test_parse_job_info_rejects_unknown_content_type() {
        let xml = job_info_with("750x", "insert", "ZIP_CSV", "Open", 0, 0, 0, 0);
        let err = JobInfo::parse(&xml).unwrap_err();
        assert!(matches!(err.kind, crate::ErrorKind::MalformedPayload(_)));
    }

    #[test]
    fn test_parse_batch_info() {
        let info = BatchInfo::parse(&batch_info("751D0000000004rIAA", "750x", "InProgress", 5, 1))
            .unwrap();
        assert_eq!(info.id, "751D0000000004rIAA");
        assert_eq!(info.job_id, "750x");
        assert_eq!(info.state, Some(BatchState::InProgress));
        assert_eq!(info.number_records_processed, 5);
        assert_eq!(info.number_records_failed, 1);
    }

    #[test]
    fn test_parse_batch_info_list() {
        let list = parse_batch_info_list(&batch_info_list(&[
            ("751A", "750x", "Completed"),
            ("751B", "750x", "Queued"),
        ]))
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "751A");
        assert_eq!(list[1].state, Some(BatchState::Queued));

        let empty = parse_batch_info_list(
            r#"<batchInfoList xmlns="http://www.force.com/2009/06/asyncapi/dataload"></batchInfoList>"#,
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_result_list() {
        let ids = parse_result_list(
            r#"<result-list xmlns="http://www.force.com/2009/06/asyncapi/dataload"><result>752x00000004CJE</result><result>752x00000004CJF</result></result-list>"#,
        )
        .unwrap();
        assert_eq!(ids, vec!["752x00000004CJE", "752x00000004CJF"]);
    }

    #[test]
    fn test_error_details() {
        let (code, message) = error_details(&error_document("InvalidJob", "Unable to find object: Acount"));
        assert_eq!(code.as_deref(), Some("InvalidJob"));
        assert_eq!(message.as_deref(), Some("Unable to find object: Acount"));

        assert_eq!(error_details("<html>Bad Gateway</html>"), (None, None));
    }

    #[test]
    fn test_job_descriptor_xml() {
        let xml = JobDescriptor {
            operation: Operation::Upsert,
            object: "Contact",
            external_id_field_name: Some("Ext_Id__c"),
            concurrency_mode: Some(ConcurrencyMode::Serial),
            content_type: ContentType::Xml,
            assignment_rule_id: None,
        }
        .to_xml()
        .unwrap();

        assert!(xml.contains(r#"<jobInfo xmlns="http://www.force.com/2009/06/asyncapi/dataload">"#));
        let operation = xml.find("<operation>upsert</operation>").unwrap();
        let object = xml.find("<object>Contact</object>").unwrap();
        let external = xml.find("<externalIdFieldName>Ext_Id__c</externalIdFieldName>").unwrap();
        let mode = xml.find("<concurrencyMode>Serial</concurrencyMode>").unwrap();
        let content = xml.find("<contentType>XML</contentType>").unwrap();
        assert!(operation < object && object < external && external < mode && mode < content);
    }

    #[test]
    fn test_state_document() {
        let xml = state_document(JobState::Closed).unwrap();
        assert!(xml.ends_with("<state>Closed</state></jobInfo>"));
    }
}
