//! Per-device report sections.

use serde::Serialize;

use crate::access::{ObjectAccess, ObjectRef};
use crate::error::ReportResult;
use crate::model::{Device, UserId};

/// The records of one device plus the names printed above them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection<R> {
    /// Name of the device.
    pub device_name: String,

    /// Name of the device's group, when it resolves for the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    /// Records in chronological order.
    pub records: Vec<R>,
}

/// Build the section for `device`.
///
/// A group the user cannot see, or one that no longer exists, leaves
/// `group_name` empty.
///
/// # Errors
///
/// Propagates collaborator failures.
pub async fn assemble_section<R>(
    device: &Device,
    records: Vec<R>,
    user_id: UserId,
    objects: &dyn ObjectAccess,
) -> ReportResult<ReportSection<R>> {
    let group_name = match device.group_id {
        Some(group_id) => objects
            .try_resolve(user_id, ObjectRef::Group(group_id))
            .await?
            .map(|group| group.name),
        None => None,
    };

    Ok(ReportSection {
        device_name: device.name.clone(),
        group_name,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MockObjectAccess;
    use crate::model::{DeviceId, GroupId, NamedObject};
    use mockall::predicate::eq;

    fn device(group: Option<i64>) -> Device {
        Device {
            id: DeviceId(10),
            name: "Van".to_string(),
            group_id: group.map(GroupId),
        }
    }

    #[tokio::test]
    async fn test_group_name_is_resolved() {
        let mut objects = MockObjectAccess::new();
        objects
            .expect_try_resolve()
            .with(eq(UserId(1)), eq(ObjectRef::Group(GroupId(3))))
            .times(1)
            .returning(|_, _| {
                Ok(Some(NamedObject {
                    id: 3,
                    name: "North".to_string(),
                }))
            });

        let section = assemble_section(&device(Some(3)), vec![1, 2], UserId(1), &objects)
            .await
            .unwrap();
        assert_eq!(section.device_name, "Van");
        assert_eq!(section.group_name.as_deref(), Some("North"));
        assert_eq!(section.records, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_dangling_group_is_omitted() {
        let mut objects = MockObjectAccess::new();
        objects.expect_try_resolve().returning(|_, _| Ok(None));

        let section = assemble_section(&device(Some(99)), Vec::<i32>::new(), UserId(1), &objects)
            .await
            .unwrap();
        assert_eq!(section.group_name, None);
    }

    #[tokio::test]
    async fn test_ungrouped_device_skips_lookup() {
        let mut objects = MockObjectAccess::new();
        objects.expect_try_resolve().times(0);

        let section = assemble_section(&device(None), vec!["a"], UserId(1), &objects)
            .await
            .unwrap();
        assert_eq!(section.group_name, None);
        let json = serde_json::to_value(&section).unwrap();
        assert!(json.get("groupName").is_none());
    }
}
