use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of an approval instance as reported by the vendor.
/// States the vendor adds later land in `Other` with the original string
/// intact, so the instance row stays queryable by the vendor's own label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
    Deleted,
    Reverted,
    Other(String),
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Canceled => "CANCELED",
            ApprovalStatus::Deleted => "DELETED",
            ApprovalStatus::Reverted => "REVERTED",
            ApprovalStatus::Other(label) => label,
        }
    }
}

impl From<String> for ApprovalStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "PENDING" => ApprovalStatus::Pending,
            "APPROVED" => ApprovalStatus::Approved,
            "REJECTED" => ApprovalStatus::Rejected,
            "CANCELED" => ApprovalStatus::Canceled,
            "DELETED" => ApprovalStatus::Deleted,
            "REVERTED" => ApprovalStatus::Reverted,
            _ => ApprovalStatus::Other(label),
        }
    }
}

impl From<ApprovalStatus> for String {
    fn from(status: ApprovalStatus) -> Self {
        status.as_str().to_string()
    }
}

/// The vendor encodes the same logical form three different ways depending
/// on API version and callback path: a JSON string, an already-decoded list,
/// or something else entirely. Absence is modeled as `Option::None` on the
/// containing instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FormPayload {
    Encoded(String),
    Decoded(Vec<Value>),
    Other(Value),
}

/// One approver / routing node within an instance.
///
/// Everything is optional: the vendor omits fields freely and we prefer a
/// sparse row over a dropped event. Unknown keys are carried in `extra` so
/// the per-task audit column does not lose them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskRecord {
    #[serde(default, alias = "task_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Typed view of the vendor's `data` payload for one approval instance.
/// Deserialization is deliberately lenient: every field defaults, so vendor
/// schema drift degrades to `None`s rather than a failed event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalInstance {
    #[serde(default)]
    pub instance_code: Option<String>,
    #[serde(default)]
    pub approval_code: Option<String>,
    #[serde(default)]
    pub approval_name: Option<String>,
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default, alias = "applicant_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub form: Option<FormPayload>,
    #[serde(default)]
    pub task_list: Vec<TaskRecord>,
}

/// One normalized form field, ready for the form-field table.
/// `field_value` is always a string: plain strings are stored as-is,
/// structured values as JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub field_id: String,
    pub field_name: String,
    pub field_type: String,
    pub field_value: String,
    pub raw: Value,
}

/// Column set for the instance table, kept in lock-step with the upsert in
/// `store::postgres` so SQL and in-memory shape cannot drift apart.
#[derive(Debug, Clone)]
pub struct InstanceRow {
    pub instance_code: String,
    pub approval_code: Option<String>,
    pub approval_name: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub user_id: Option<String>,
    pub department_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Column set for one task row, keyed by `(instance_code, task_id)`.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub task_id: String,
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub node_name: Option<String>,
    pub node_type: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub raw_json: Value,
}

/// Everything the persistence gateway writes for one event, built once by
/// `InstanceSnapshot::build` from the fetched instance.
#[derive(Debug, Clone)]
pub struct InstanceSnapshot {
    pub instance_code: String,
    pub raw: Value,
    pub instance: InstanceRow,
    pub tasks: Vec<TaskRow>,
    pub fields: Vec<FieldRecord>,
}

impl InstanceSnapshot {
    /// Map a fetched instance into the persisted shape. `instance_code` comes
    /// from the inbound event, which is authoritative for keying even when
    /// the vendor payload omits it.
    pub fn build(
        instance_code: &str,
        raw: Value,
        instance: &ApprovalInstance,
        fields: Vec<FieldRecord>,
    ) -> Self {
        let tasks = instance
            .task_list
            .iter()
            .filter_map(|task| {
                let task_id = match task.id.as_deref().map(str::trim) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => {
                        tracing::warn!(instance_code, "task without id in task_list, skipping");
                        return None;
                    }
                };
                Some(TaskRow {
                    task_id,
                    user_id: task.user_id.clone(),
                    status: task.status.clone(),
                    node_name: task.node_name.clone(),
                    node_type: task.node_type.clone(),
                    start_time: clean_time(task.start_time.as_deref()),
                    end_time: clean_time(task.end_time.as_deref()),
                    raw_json: serde_json::to_value(task).unwrap_or(Value::Null),
                })
            })
            .collect();

        InstanceSnapshot {
            instance_code: instance_code.to_string(),
            raw,
            instance: InstanceRow {
                instance_code: instance_code.to_string(),
                approval_code: instance.approval_code.clone(),
                approval_name: instance.approval_name.clone(),
                status: instance.status.clone(),
                user_id: instance.user_id.clone(),
                department_id: instance.department_id.clone(),
                start_time: clean_time(instance.start_time.as_deref()),
                end_time: clean_time(instance.end_time.as_deref()),
            },
            tasks,
            fields,
        }
    }
}

/// The vendor reports "not yet ended" as `""` or `"0"`; both mean NULL here
/// so that a real end_time from a later event is the first non-null write.
fn clean_time(value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        None | Some("") | Some("0") => None,
        Some(v) => Some(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_deserializes_known_and_unknown() {
        let s: ApprovalStatus = serde_json::from_value(json!("APPROVED")).unwrap();
        assert_eq!(s, ApprovalStatus::Approved);
        assert_eq!(s.as_str(), "APPROVED");

        // a state this build does not know keeps the vendor's label verbatim
        let s: ApprovalStatus = serde_json::from_value(json!("SOME_FUTURE_STATE")).unwrap();
        assert_eq!(s, ApprovalStatus::Other("SOME_FUTURE_STATE".to_string()));
        assert_eq!(s.as_str(), "SOME_FUTURE_STATE");
    }

    #[test]
    fn test_unrecognized_status_reaches_instance_row_verbatim() {
        let inst: ApprovalInstance = serde_json::from_value(json!({
            "instance_code": "I1",
            "status": "SUSPENDED_BY_ADMIN"
        }))
        .unwrap();
        let snap = InstanceSnapshot::build("I1", json!({}), &inst, vec![]);
        assert_eq!(
            snap.instance.status.as_ref().map(|s| s.as_str()),
            Some("SUSPENDED_BY_ADMIN")
        );
    }

    #[test]
    fn test_form_payload_decodes_each_wire_shape() {
        let encoded: FormPayload = serde_json::from_value(json!("[{\"id\":\"f1\"}]")).unwrap();
        assert!(matches!(encoded, FormPayload::Encoded(_)));

        let decoded: FormPayload = serde_json::from_value(json!([{"id": "f1"}])).unwrap();
        assert!(matches!(decoded, FormPayload::Decoded(_)));

        let other: FormPayload = serde_json::from_value(json!({"id": "f1"})).unwrap();
        assert!(matches!(other, FormPayload::Other(_)));
    }

    #[test]
    fn test_instance_tolerates_sparse_payload() {
        let inst: ApprovalInstance = serde_json::from_value(json!({
            "instance_code": "I1",
            "status": "PENDING"
        }))
        .unwrap();
        assert_eq!(inst.instance_code.as_deref(), Some("I1"));
        assert_eq!(inst.status, Some(ApprovalStatus::Pending));
        assert!(inst.task_list.is_empty());
        assert!(inst.form.is_none());
    }

    #[test]
    fn test_task_record_accepts_id_aliases_and_keeps_extra_keys() {
        let task: TaskRecord = serde_json::from_value(json!({
            "task_id": "T1",
            "type": "AND",
            "custom_key": "kept"
        }))
        .unwrap();
        assert_eq!(task.id.as_deref(), Some("T1"));
        assert_eq!(task.node_type.as_deref(), Some("AND"));
        assert_eq!(task.extra["custom_key"], "kept");

        let round = serde_json::to_value(&task).unwrap();
        assert_eq!(round["custom_key"], "kept");
    }

    #[test]
    fn test_snapshot_build_keys_tasks_and_cleans_times() {
        let inst: ApprovalInstance = serde_json::from_value(json!({
            "instance_code": "I1",
            "status": "PENDING",
            "start_time": "1700000000000",
            "end_time": "0",
            "task_list": [
                {"id": "T1", "user_id": "u1", "status": "PENDING", "end_time": ""},
                {"user_id": "orphan"}
            ]
        }))
        .unwrap();

        let snap = InstanceSnapshot::build("I1", json!({"instance_code": "I1"}), &inst, vec![]);
        assert_eq!(snap.instance.end_time, None);
        assert_eq!(snap.instance.start_time.as_deref(), Some("1700000000000"));
        // the id-less task is dropped, not persisted under a bogus key
        assert_eq!(snap.tasks.len(), 1);
        assert_eq!(snap.tasks[0].task_id, "T1");
        assert_eq!(snap.tasks[0].end_time, None);
    }
}
