//! Group membership queries
//!
//! Groups are plain rows seeded by operations; the application only
//! attaches meaning to the three names below when classifying a role.

use crate::orm::{groups, user_groups, users};
use sea_orm::{entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr};

pub const GROUP_MANAGER: &str = "Manager";
pub const GROUP_SUPPORT_AGENT: &str = "SupportAgent";
pub const GROUP_STUDENT: &str = "Student";

/// Names of every group the user belongs to.
pub async fn get_group_names_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<String>, DbErr> {
    let rows = user_groups::Entity::find()
        .filter(user_groups::Column::UserId.eq(user_id))
        .find_also_related(groups::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(_, group)| group.map(|g| g.name))
        .collect())
}

/// Users belonging to the named group, ordered by username. Used to build
/// the reassignment candidate list from the SupportAgent group.
pub async fn users_in_group(
    db: &DatabaseConnection,
    group_name: &str,
) -> Result<Vec<users::Model>, DbErr> {
    let group = match groups::Entity::find()
        .filter(groups::Column::Name.eq(group_name))
        .one(db)
        .await?
    {
        Some(group) => group,
        None => return Ok(Vec::new()),
    };

    let member_ids: Vec<i32> = user_groups::Entity::find()
        .filter(user_groups::Column::GroupId.eq(group.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.user_id)
        .collect();

    if member_ids.is_empty() {
        return Ok(Vec::new());
    }

    users::Entity::find()
        .filter(users::Column::Id.is_in(member_ids))
        .order_by_asc(users::Column::Username)
        .all(db)
        .await
}
