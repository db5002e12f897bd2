use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use wardline_supabase::Page;

use crate::pagination::Pagination;
use crate::routes::models::{
    AddMemberRequest, CreateDepartmentRequest, Department, DepartmentMembership, MembershipRole,
    UpdateDepartmentRequest,
};
use crate::services::{audit::AuditLog, ServiceError};
use crate::state::Session;

#[derive(Debug, Serialize)]
struct NewDepartment<'a> {
    name: &'a str,
    code: &'a str,
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MembershipUpsert {
    department_id: Uuid,
    user_id: Uuid,
    membership_role: MembershipRole,
}

pub async fn list_departments(
    session: &Session,
    pagination: Pagination,
) -> Result<Page<Department>, ServiceError> {
    let query = session
        .db
        .from("departments")
        .select("*")
        .is_true("is_active")
        .order("name", true);

    Ok(pagination.apply(query).fetch_page().await?)
}

pub async fn get_department(session: &Session, department_id: Uuid) -> Result<Department, ServiceError> {
    Ok(session
        .db
        .from("departments")
        .select("*")
        .eq("id", department_id)
        .fetch_one()
        .await?)
}

pub async fn create_department(
    session: &Session,
    req: CreateDepartmentRequest,
) -> Result<Department, ServiceError> {
    session.access.require_admin()?;

    let row = NewDepartment {
        name: req.name.trim(),
        code: &req.code,
        description: req.description.as_deref().map(str::trim),
    };
    let department: Department = session.db.from("departments").insert(&row).await?;

    tracing::info!(department_id = %department.id, code = %department.code, "department created");
    AuditLog::record(
        &session.db,
        session.user_id(),
        "department.create",
        "department",
        Some(department.id.to_string()),
        json!({ "code": department.code }),
    )
    .await;

    Ok(department)
}

pub async fn update_department(
    session: &Session,
    department_id: Uuid,
    req: UpdateDepartmentRequest,
) -> Result<Department, ServiceError> {
    session.access.require_admin()?;

    let department: Department = session
        .db
        .from("departments")
        .eq("id", department_id)
        .update(&req)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "department.update",
        "department",
        Some(department_id.to_string()),
        json!(req),
    )
    .await;

    Ok(department)
}

pub async fn list_members(
    session: &Session,
    department_id: Uuid,
) -> Result<Vec<DepartmentMembership>, ServiceError> {
    session.access.require_view(department_id)?;

    Ok(session
        .db
        .from("department_memberships")
        .select("*")
        .eq("department_id", department_id)
        .order("created_at", true)
        .fetch()
        .await?)
}

pub async fn add_member(
    session: &Session,
    department_id: Uuid,
    req: AddMemberRequest,
) -> Result<DepartmentMembership, ServiceError> {
    session.access.require_manage(department_id)?;

    let row = MembershipUpsert {
        department_id,
        user_id: req.user_id,
        membership_role: req.membership_role,
    };
    let membership: DepartmentMembership = session
        .db
        .from("department_memberships")
        .on_conflict("department_id,user_id")
        .upsert(&row)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "department.member_upsert",
        "department",
        Some(department_id.to_string()),
        json!({ "user_id": req.user_id, "membership_role": req.membership_role }),
    )
    .await;

    Ok(membership)
}

pub async fn remove_member(
    session: &Session,
    department_id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    session.access.require_manage(department_id)?;

    session
        .db
        .from("department_memberships")
        .eq("department_id", department_id)
        .eq("user_id", user_id)
        .delete()
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "department.member_remove",
        "department",
        Some(department_id.to_string()),
        json!({ "user_id": user_id }),
    )
    .await;

    Ok(())
}
