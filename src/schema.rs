use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ApiError, FieldError, ValidationErrors};

const MAX_USERNAME_LEN: usize = 50;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// JSON type a top-level body field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
    Timestamp,
}

impl FieldKind {
    fn mismatch(self, value: &Value) -> Option<(&'static str, &'static str)> {
        let ok = match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Timestamp => value
                .as_str()
                .map(|s| s.parse::<DateTime<Utc>>().is_ok())
                .unwrap_or(false),
        };
        if ok {
            return None;
        }
        Some(match self {
            FieldKind::Text => ("str type expected", "type_error.str"),
            FieldKind::Bool => ("value could not be parsed to a boolean", "type_error.bool"),
            FieldKind::Timestamp => ("invalid datetime format", "value_error.datetime"),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Boundary checks for a request body.
///
/// [`check_shape`] runs `FIELDS` against the raw JSON so every missing or mistyped
/// field is reported at once; `validate` runs on the deserialized value.
pub trait Validate {
    const FIELDS: &'static [FieldSpec];

    fn validate(&self) -> Result<(), ApiError>;
}

/// Collects one error per missing, null-but-required, or mistyped field.
/// Unknown fields are ignored.
pub fn check_shape(fields: &[FieldSpec], body: &Value) -> Result<(), ApiError> {
    let Some(object) = body.as_object() else {
        return Err(ApiError::Validation(vec![FieldError::new(
            &["body"],
            "Expected a JSON object",
            "type_error.dict",
        )]));
    };

    let mut errors = ValidationErrors::new();
    for field in fields {
        match object.get(field.name) {
            None if field.required => {
                errors.add(field.name, "field required", "value_error.missing")
            }
            Some(Value::Null) if field.required => errors.add(
                field.name,
                "none is not an allowed value",
                "type_error.none.not_allowed",
            ),
            None | Some(Value::Null) => {}
            Some(value) => {
                if let Some((msg, kind)) = field.kind.mismatch(value) {
                    errors.add(field.name, msg, kind);
                }
            }
        }
    }
    errors.into_result()
}

#[derive(Debug, Deserialize)]
pub struct RegisterSchema {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Validate for RegisterSchema {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::Text),
        FieldSpec::required("password", FieldKind::Text),
        FieldSpec::optional("email", FieldKind::Text),
    ];

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_username(&mut errors, &self.username);
        if self.password.is_empty() {
            errors.add("password", "Password must not be empty", "value_error");
        } else if self.password.len() > MAX_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at most {} bytes", MAX_PASSWORD_LEN),
                "value_error",
            );
        }
        if let Some(email) = &self.email {
            let valid = email
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !valid {
                errors.add("email", "Not a valid email address", "value_error.email");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginSchema {
    pub username: String,
    pub password: String,
}

impl Validate for LoginSchema {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::Text),
        FieldSpec::required("password", FieldKind::Text),
    ];

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "Username must not be empty", "value_error");
        }
        if self.password.is_empty() {
            errors.add("password", "Password must not be empty", "value_error");
        }
        errors.into_result()
    }
}

// Struct representing the request body for creating a new Todo
#[derive(Debug, Deserialize)]
pub struct CreateTodoSchema {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl Validate for CreateTodoSchema {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::Text),
        FieldSpec::optional("due_date", FieldKind::Timestamp),
    ];

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        check_title(&mut errors, &self.title);
        if let Some(description) = &self.description {
            check_description(&mut errors, description);
        }
        errors.into_result()
    }
}

/// Partial update. Omitted fields stay as stored; `description` and `due_date`
/// can be cleared with an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoSchema {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl Validate for UpdateTodoSchema {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("title", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::Text),
        FieldSpec::optional("completed", FieldKind::Bool),
        FieldSpec::optional("due_date", FieldKind::Timestamp),
    ];

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            check_title(&mut errors, title);
        }
        if let Some(Some(description)) = &self.description {
            check_description(&mut errors, description);
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteTodoSchema {
    pub completed: bool,
}

impl Validate for CompleteTodoSchema {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::required("completed", FieldKind::Bool)];

    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

// Marks a field as supplied, even when its value is null.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_username(errors: &mut ValidationErrors, username: &str) {
    if username.trim().is_empty() {
        errors.add("username", "Username must not be empty", "value_error");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("Username must be at most {} characters", MAX_USERNAME_LEN),
            "value_error",
        );
    } else if username.chars().any(char::is_whitespace) {
        errors.add("username", "Username must not contain whitespace", "value_error");
    }
}

fn check_title(errors: &mut ValidationErrors, title: &str) {
    if title.trim().is_empty() {
        errors.add("title", "Title must not be empty", "value_error");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.add(
            "title",
            format!("Title must be at most {} characters", MAX_TITLE_LEN),
            "value_error",
        );
    }
}

fn check_description(errors: &mut ValidationErrors, description: &str) {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.add(
            "description",
            format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
            "value_error",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_errors(result: Result<(), ApiError>) -> Vec<FieldError> {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        let body = CreateTodoSchema {
            title: "   ".to_string(),
            description: None,
            due_date: None,
        };
        let errors = field_errors(body.validate());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].loc, vec!["body", "title"]);
    }

    #[test]
    fn register_reports_every_bad_field() {
        let body = RegisterSchema {
            username: "".to_string(),
            password: "".to_string(),
            email: Some("nope".to_string()),
        };
        let fields: Vec<String> = field_errors(body.validate())
            .into_iter()
            .map(|e| e.loc[1].clone())
            .collect();
        assert_eq!(fields, vec!["username", "password", "email"]);
    }

    #[test]
    fn short_passwords_are_allowed() {
        let body = RegisterSchema {
            username: "alice".to_string(),
            password: "pw1".to_string(),
            email: None,
        };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn update_distinguishes_null_from_missing() {
        let omitted: UpdateTodoSchema = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(omitted.description, None);
        assert_eq!(omitted.completed, Some(true));

        let cleared: UpdateTodoSchema =
            serde_json::from_str(r#"{"description": null, "due_date": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.due_date, Some(None));

        let set: UpdateTodoSchema = serde_json::from_str(r#"{"description": "2 litres"}"#).unwrap();
        assert_eq!(set.description, Some(Some("2 litres".to_string())));
    }

    #[test]
    fn update_with_empty_title_is_rejected() {
        let body = UpdateTodoSchema {
            title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(field_errors(body.validate())[0].loc, vec!["body", "title"]);
    }

    #[test]
    fn shape_check_reports_every_missing_field() {
        let errors = field_errors(check_shape(RegisterSchema::FIELDS, &json!({})));
        let locs: Vec<Vec<String>> = errors.iter().map(|e| e.loc.clone()).collect();
        assert_eq!(locs, vec![vec!["body", "username"], vec!["body", "password"]]);
        assert!(errors.iter().all(|e| e.kind == "value_error.missing"));
    }

    #[test]
    fn shape_check_reports_wrong_types_alongside_missing_fields() {
        let body = json!({"description": 5, "due_date": "next tuesday"});
        let errors = field_errors(check_shape(CreateTodoSchema::FIELDS, &body));
        let fields: Vec<&str> = errors.iter().map(|e| e.loc[1].as_str()).collect();
        assert_eq!(fields, vec!["title", "description", "due_date"]);
        assert_eq!(errors[2].kind, "value_error.datetime");
    }

    #[test]
    fn shape_check_allows_null_only_for_optional_fields() {
        let update = json!({"title": null, "description": null, "due_date": "2030-01-15T09:30:00Z"});
        assert!(check_shape(UpdateTodoSchema::FIELDS, &update).is_ok());

        let errors = field_errors(check_shape(CompleteTodoSchema::FIELDS, &json!({"completed": null})));
        assert_eq!(errors[0].loc, vec!["body", "completed"]);
        assert_eq!(errors[0].kind, "type_error.none.not_allowed");
    }

    #[test]
    fn shape_check_needs_an_object() {
        let errors = field_errors(check_shape(LoginSchema::FIELDS, &json!(["alice", "pw1"])));
        assert_eq!(errors[0].loc, vec!["body"]);
    }
}
