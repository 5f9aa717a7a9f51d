//! Table/column mapping for deployments that point the service at an existing
//! CRM users table. Identifiers are validated once here; everything a request
//! supplies is bound as a parameter.

use anyhow::{Result, bail};

#[derive(Clone, Debug)]
pub struct SchemaMap {
    users_table: String,
    user_id_col: String,
    user_name_col: Option<String>,
    user_first_name_col: Option<String>,
    user_last_name_col: Option<String>,
    user_email_col: String,
    user_password_col: String,
    user_first_login_col: Option<String>,
    user_last_login_col: Option<String>,
    attendance_table: String,
}

/// SQL text rendered from a [`SchemaMap`] at start-up.
#[derive(Clone, Debug)]
pub struct UserQueries {
    /// Whether `insert` and `update_profile` take a leading name parameter.
    pub binds_name: bool,
    pub select_by_email: String,
    pub select_by_id: String,
    pub select_other_with_email: String,
    pub insert: String,
    pub update_password: String,
    pub update_profile: String,
    pub touch_last_login: Option<String>,
    pub count: String,
    pub today_checked_in: String,
}

impl Default for SchemaMap {
    fn default() -> Self {
        Self {
            users_table: "users".into(),
            user_id_col: "id".into(),
            user_name_col: Some("name".into()),
            user_first_name_col: None,
            user_last_name_col: None,
            user_email_col: "email".into(),
            user_password_col: "password".into(),
            user_first_login_col: Some("is_first_login".into()),
            user_last_login_col: Some("last_login_at".into()),
            attendance_table: "attendance".into(),
        }
    }
}

fn ident(key: &str, value: String) -> Result<String> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_start || !valid_rest || value.len() > 64 {
        bail!("{key} must be a plain SQL identifier, got {value:?}");
    }
    Ok(value)
}

/// `-` disables an optional column.
fn optional_ident(key: &str, value: Option<String>, default: Option<&str>) -> Result<Option<String>> {
    match value {
        Some(v) if v == "-" => Ok(None),
        Some(v) => ident(key, v).map(Some),
        None => Ok(default.map(str::to_string)),
    }
}

impl SchemaMap {
    pub fn from_lookup<G>(get: &G) -> Result<Self>
    where
        G: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let required = |key: &str, default: String| ident(key, get(key).unwrap_or(default));

        let map = Self {
            users_table: required("USER_TABLE", d.users_table)?,
            user_id_col: required("USER_ID_COL", d.user_id_col)?,
            user_name_col: optional_ident("USER_NAME_COL", get("USER_NAME_COL"), Some("name"))?,
            user_first_name_col: optional_ident(
                "USER_FIRST_NAME_COL",
                get("USER_FIRST_NAME_COL"),
                None,
            )?,
            user_last_name_col: optional_ident(
                "USER_LAST_NAME_COL",
                get("USER_LAST_NAME_COL"),
                None,
            )?,
            user_email_col: required("USER_EMAIL_COL", d.user_email_col)?,
            user_password_col: required("USER_PASSWORD_COL", d.user_password_col)?,
            user_first_login_col: optional_ident(
                "USER_FIRST_LOGIN_COL",
                get("USER_FIRST_LOGIN_COL"),
                Some("is_first_login"),
            )?,
            user_last_login_col: optional_ident(
                "USER_LAST_LOGIN_COL",
                get("USER_LAST_LOGIN_COL"),
                Some("last_login_at"),
            )?,
            attendance_table: required("ATTENDANCE_TABLE", d.attendance_table)?,
        };
        Ok(map)
    }

    pub fn users_table(&self) -> &str {
        &self.users_table
    }

    pub fn attendance_table(&self) -> &str {
        &self.attendance_table
    }

    fn name_expr(&self, alias: &str) -> String {
        match (
            &self.user_first_name_col,
            &self.user_last_name_col,
            &self.user_name_col,
        ) {
            (Some(first), Some(last), _) => {
                format!("CONCAT(TRIM({alias}`{first}`), ' ', TRIM({alias}`{last}`))")
            }
            (_, _, Some(name)) => format!("{alias}`{name}`"),
            _ => "''".to_string(),
        }
    }

    fn select_user(&self) -> String {
        let first_login = match &self.user_first_login_col {
            Some(col) => format!("CAST(COALESCE(`{col}`, 0) AS SIGNED)"),
            None => "CAST(0 AS SIGNED)".to_string(),
        };
        format!(
            "SELECT CAST(`{id}` AS UNSIGNED) AS id, {name} AS name, `{email}` AS email, \
             `{password}` AS password, {first_login} AS is_first_login FROM `{table}`",
            id = self.user_id_col,
            name = self.name_expr(""),
            email = self.user_email_col,
            password = self.user_password_col,
            table = self.users_table,
        )
    }

    pub fn user_queries(&self) -> UserQueries {
        let select = self.select_user();
        let table = &self.users_table;
        let id = &self.user_id_col;
        let email = &self.user_email_col;
        let password = &self.user_password_col;

        let insert = match &self.user_name_col {
            Some(name) => format!(
                "INSERT INTO `{table}` (`{name}`, `{email}`, `{password}`) VALUES (?, ?, ?)"
            ),
            None => format!("INSERT INTO `{table}` (`{email}`, `{password}`) VALUES (?, ?)"),
        };

        let update_password = match &self.user_first_login_col {
            Some(flag) => format!(
                "UPDATE `{table}` SET `{password}` = ?, `{flag}` = FALSE WHERE `{id}` = ?"
            ),
            None => format!("UPDATE `{table}` SET `{password}` = ? WHERE `{id}` = ?"),
        };

        let update_profile = match &self.user_name_col {
            Some(name) => {
                format!("UPDATE `{table}` SET `{name}` = ?, `{email}` = ? WHERE `{id}` = ?")
            }
            None => format!("UPDATE `{table}` SET `{email}` = ? WHERE `{id}` = ?"),
        };

        UserQueries {
            binds_name: self.user_name_col.is_some(),
            select_by_email: format!("{select} WHERE LOWER(`{email}`) = LOWER(?) LIMIT 1"),
            select_by_id: format!("{select} WHERE `{id}` = ? LIMIT 1"),
            select_other_with_email: format!(
                "SELECT COUNT(*) FROM `{table}` WHERE LOWER(`{email}`) = LOWER(?) AND `{id}` <> ?"
            ),
            insert,
            update_password,
            update_profile,
            touch_last_login: self.user_last_login_col.as_ref().map(|col| {
                format!("UPDATE `{table}` SET `{col}` = NOW() WHERE `{id}` = ?")
            }),
            count: format!("SELECT COUNT(*) FROM `{table}`"),
            today_checked_in: format!(
                "SELECT a.user_id, {name} AS name, a.date, a.check_in_time, a.check_out_time, \
                 a.attendance_type, a.status \
                 FROM `{attendance}` a \
                 LEFT JOIN `{table}` u ON u.`{id}` = a.user_id \
                 WHERE a.date = ? AND a.check_in_time IS NOT NULL \
                 ORDER BY a.check_in_time ASC",
                name = self.name_expr("u."),
                attendance = self.attendance_table,
            ),
        }
    }
}
