use std::{cell::RefCell, marker::PhantomData, ops::Deref, rc::Rc};

use leptos::logging;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    interceptor::InterceptorGuard, FetchController, FetchError, FetchOptions, Response,
    ResponseInterceptors, ValidationError, ValidationIssue,
};

/// Validates and normalizes response bodies.
pub trait Schema {
    /// Checks `value` against the schema and returns its normalized form.
    fn parse(&self, value: Value) -> Result<Value, SchemaError>;

    /// Generates a value conforming to the schema, used in mock mode.
    fn mock(&self) -> Option<Value> {
        None
    }
}

/// Shared handle to a [`Schema`].
pub type SchemaRef = Rc<dyn Schema>;

/// Failure reported by [`Schema::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Kind of failure.
    pub name: String,
    /// Summary of the failure.
    pub message: String,
    /// Individual violations.
    pub issues: Vec<ValidationIssue>,
}

impl SchemaError {
    /// A schema mismatch with a single issue.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            name: "ValidationError".to_string(),
            issues: vec![ValidationIssue {
                path: None,
                message: message.clone(),
            }],
            message,
        }
    }

    /// A schema mismatch with several issues.
    pub fn with_issues(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            name: "ValidationError".to_string(),
            message: message.into(),
            issues,
        }
    }

    /// A failure that is not a mismatch, e.g. the schema itself misbehaved.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            name: "OtherValidationError".to_string(),
            ..Self::new(message)
        }
    }
}

/// A [`Schema`] backed by a serde type.
///
/// Parsing deserializes the body into `T` and serializes it back, so defaults and
/// renames declared on `T` are applied to the body.
pub struct SerdeSchema<T> {
    mock: Option<Rc<dyn Fn() -> T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    /// A schema without mock support.
    pub fn new() -> Self {
        Self {
            mock: None,
            _marker: PhantomData,
        }
    }

    /// Use `mock` to generate values in mock mode.
    pub fn with_mock(self, mock: impl Fn() -> T + 'static) -> Self {
        SerdeSchema {
            mock: Some(Rc::new(mock)),
            ..self
        }
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SerdeSchema<T> {
    fn clone(&self) -> Self {
        Self {
            mock: self.mock.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Schema for SerdeSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn parse(&self, value: Value) -> Result<Value, SchemaError> {
        let parsed: T =
            serde_json::from_value(value).map_err(|error| SchemaError::new(error.to_string()))?;
        serde_json::to_value(parsed).map_err(|error| SchemaError::other(error.to_string()))
    }

    fn mock(&self) -> Option<Value> {
        let mock = self.mock.as_ref()?;
        match serde_json::to_value(mock()) {
            Ok(value) => Some(value),
            Err(error) => {
                logging::error!("Failed to serialize mock value: {error}");
                None
            }
        }
    }
}

/// A validating interceptor on a response chain. Ejected when dropped.
#[derive(Debug)]
pub struct ValidationInterceptor {
    guard: InterceptorGuard<Response>,
    mock: bool,
}

impl ValidationInterceptor {
    /// Registers `schema` on `interceptors`.
    ///
    /// Successful responses have their body replaced by the parsed value, or fail with
    /// [`FetchError::Validation`]. With `mock`, bodies and non-cancellation failures are
    /// replaced by [`Schema::mock`] values whenever the schema provides one.
    pub fn register(interceptors: &ResponseInterceptors, schema: SchemaRef, mock: bool) -> Self {
        let guard =
            interceptors.add_guarded(move |outcome| validate(schema.as_ref(), mock, outcome));
        Self { guard, mock }
    }

    /// Whether this interceptor runs in mock mode.
    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// The id of the registered interceptor.
    pub fn id(&self) -> crate::InterceptorId {
        self.guard.id()
    }
}

fn validate(
    schema: &dyn Schema,
    mock: bool,
    outcome: Result<Response, FetchError>,
) -> Result<Response, FetchError> {
    match outcome {
        Ok(mut response) => {
            if mock {
                if let Some(value) = schema.mock() {
                    response.data = value;
                    return Ok(response);
                }
                logging::debug_warn!("Mock mode is on but the schema has no mock values.");
            }

            match schema.parse(response.data.clone()) {
                Ok(value) => {
                    response.data = value;
                    Ok(response)
                }
                Err(SchemaError {
                    name,
                    message,
                    issues,
                }) => Err(ValidationError {
                    name,
                    message,
                    issues,
                    response: Box::new(response),
                }
                .into()),
            }
        }
        Err(error) if mock && !error.is_cancel() => match schema.mock() {
            Some(value) => {
                logging::debug_warn!("Replacing failed request with a mock response: {error}");
                Ok(Response::mocked(value))
            }
            None => Err(error),
        },
        Err(error) => Err(error),
    }
}

struct ValidationSlot {
    schema: Option<SchemaRef>,
    interceptor: Option<ValidationInterceptor>,
}

/// A [`FetchController`] whose responses are validated against a [`Schema`].
///
/// The validation interceptor is registered on construction and on
/// [`activate`](Self::activate), and ejected on [`deactivate`](Self::deactivate).
/// Changing the schema or the mock flag ejects the old interceptor and registers a
/// new one; a live interceptor is never modified.
#[derive(Clone)]
pub struct ValidatedFetchController {
    controller: FetchController,
    validation: Rc<RefCell<ValidationSlot>>,
}

impl ValidatedFetchController {
    /// Wraps `controller`, registering `schema` if present.
    pub fn new(controller: FetchController, schema: Option<SchemaRef>) -> Self {
        let validation = Rc::new(RefCell::new(ValidationSlot {
            schema,
            interceptor: None,
        }));

        // Every path that changes the options ends up here, including the wrapped
        // controller's own `set_options`.
        controller.on_options_change({
            let validation = validation.clone();
            move |controller, previous| {
                if previous.mock != controller.options().mock && !controller.is_deactivated() {
                    register(controller, &validation);
                }
            }
        });
        register(&controller, &validation);

        Self {
            controller,
            validation,
        }
    }

    /// The wrapped controller.
    pub fn controller(&self) -> &FetchController {
        &self.controller
    }

    /// Replaces the schema. `None` disables validation.
    pub fn set_schema(&self, schema: Option<SchemaRef>) {
        self.validation
            .try_borrow_mut()
            .expect("ValidatedFetchController::set_schema borrow_mut")
            .schema = schema;

        if !self.controller.is_deactivated() {
            register(&self.controller, &self.validation);
        }
    }

    /// Replaces the options, re-registering validation when `mock` changes.
    ///
    /// Same as calling [`FetchController::set_options`] on the wrapped controller.
    pub fn set_options(&self, options: FetchOptions) {
        self.controller.set_options(options);
    }

    /// Whether a validation interceptor is currently registered.
    pub fn is_validating(&self) -> bool {
        self.validation
            .try_borrow()
            .expect("ValidatedFetchController::is_validating borrow")
            .interceptor
            .is_some()
    }

    /// Registers validation and activates the controller.
    pub fn activate(&self) {
        if !self.is_validating() {
            register(&self.controller, &self.validation);
        }
        self.controller.activate();
    }

    /// Deactivates the controller and ejects validation.
    pub fn deactivate(&self) {
        self.controller.deactivate();
        self.validation
            .try_borrow_mut()
            .expect("ValidatedFetchController::deactivate borrow_mut")
            .interceptor = None;
    }
}

fn register(controller: &FetchController, validation: &RefCell<ValidationSlot>) {
    let mut slot = validation
        .try_borrow_mut()
        .expect("ValidatedFetchController::register borrow_mut");

    // Eject before registering the replacement.
    slot.interceptor = None;
    slot.interceptor = slot.schema.clone().map(|schema| {
        ValidationInterceptor::register(
            controller.response_interceptors(),
            schema,
            controller.options().mock,
        )
    });
}

impl Deref for ValidatedFetchController {
    type Target = FetchController;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}
