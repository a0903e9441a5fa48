//! CSV projections for the persisted record types.
//!
//! JSON files carry the full camelCase models via serde; CSV needs an explicit
//! flat projection. Relationships fold their participant objects into scalar
//! columns and drop the role list, which is reconstructed from the catalog
//! when drafts are built. Column order is part of the file contract.

use csv::StringRecord;

use crate::models::{
    AssignmentRecord, CustomerParticipant, CustomerRecord, DirectoryRole, Participant,
    Relationship, RelationshipStatus, SecurityGroup,
};

/// Flat CSV form of a persisted record.
pub trait Tabular {
    const CSV_HEADERS: &'static [&'static str];

    fn to_csv_row(&self) -> Vec<String>;

    fn from_csv_row(row: &StringRecord) -> Result<Self, String>
    where
        Self: Sized;
}

fn column(row: &StringRecord, index: usize) -> String {
    row.get(index).unwrap_or_default().trim().to_string()
}

impl Tabular for Relationship {
    const CSV_HEADERS: &'static [&'static str] = &[
        "id",
        "customerDelegatedAdminRelationshipId",
        "displayName",
        "partnerTenantId",
        "customerDisplayName",
        "customerTenantId",
        "duration",
        "status",
        "createdDateTime",
        "activatedDateTime",
        "lastModifiedDateTime",
        "endDateTime",
        "versionStamp",
    ];

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.customer_delegated_admin_relationship_id.clone(),
            self.display_name.clone(),
            self.partner.tenant_id.clone(),
            self.customer.display_name.clone(),
            self.customer.tenant_id.clone(),
            self.duration.clone(),
            self.status.map(|s| s.to_string()).unwrap_or_default(),
            self.created_date_time.clone(),
            self.activated_date_time.clone(),
            self.last_modified_date_time.clone(),
            self.end_date_time.clone(),
            self.version_stamp.clone(),
        ]
    }

    fn from_csv_row(row: &StringRecord) -> Result<Self, String> {
        let status_text = column(row, 7);
        let status = if status_text.is_empty() {
            None
        } else {
            RelationshipStatus::parse(&status_text)
        };
        Ok(Relationship {
            id: column(row, 0),
            customer_delegated_admin_relationship_id: column(row, 1),
            display_name: column(row, 2),
            partner: Participant {
                tenant_id: column(row, 3),
            },
            customer: CustomerParticipant {
                display_name: column(row, 4),
                tenant_id: column(row, 5),
            },
            access_details: Default::default(),
            duration: column(row, 6),
            status,
            created_date_time: column(row, 8),
            activated_date_time: column(row, 9),
            last_modified_date_time: column(row, 10),
            end_date_time: column(row, 11),
            version_stamp: column(row, 12),
        })
    }
}

impl Tabular for CustomerRecord {
    const CSV_HEADERS: &'static [&'static str] = &[
        "name",
        "partnerTenantId",
        "customerTenantId",
        "organizationDisplayName",
        "duration",
    ];

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.partner_tenant_id.clone(),
            self.customer_tenant_id.clone(),
            self.organization_display_name.clone(),
            self.duration.clone(),
        ]
    }

    fn from_csv_row(row: &StringRecord) -> Result<Self, String> {
        Ok(CustomerRecord {
            name: column(row, 0),
            partner_tenant_id: column(row, 1),
            customer_tenant_id: column(row, 2),
            organization_display_name: column(row, 3),
            duration: column(row, 4),
        })
    }
}

impl Tabular for AssignmentRecord {
    const CSV_HEADERS: &'static [&'static str] =
        &["gdapRelationshipId", "accessAssignmentId", "status"];

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.gdap_relationship_id.clone(),
            self.access_assignment_id.clone(),
            self.status.clone(),
        ]
    }

    fn from_csv_row(row: &StringRecord) -> Result<Self, String> {
        Ok(AssignmentRecord {
            gdap_relationship_id: column(row, 0),
            access_assignment_id: column(row, 1),
            status: column(row, 2),
        })
    }
}

impl Tabular for DirectoryRole {
    const CSV_HEADERS: &'static [&'static str] = &["id", "name", "description"];

    fn to_csv_row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.description.clone()]
    }

    fn from_csv_row(row: &StringRecord) -> Result<Self, String> {
        if column(row, 0).is_empty() {
            return Err("directory role row is missing the id column".to_string());
        }
        Ok(DirectoryRole {
            id: column(row, 0),
            name: column(row, 1),
            description: column(row, 2),
        })
    }
}

impl Tabular for SecurityGroup {
    const CSV_HEADERS: &'static [&'static str] = &["id", "displayName", "commaSeperatedRoles"];

    fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.display_name.clone(),
            self.comma_seperated_roles.clone(),
        ]
    }

    fn from_csv_row(row: &StringRecord) -> Result<Self, String> {
        Ok(SecurityGroup {
            id: column(row, 0),
            display_name: column(row, 1),
            comma_seperated_roles: column(row, 2),
        })
    }
}
