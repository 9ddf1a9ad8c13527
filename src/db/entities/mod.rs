pub mod auth_tokens;
pub mod bugs;
pub mod groups;
pub mod login_info;
pub mod profiles;
pub mod sub_tasks;
pub mod tasks;
pub mod user_groups;
pub mod users;
