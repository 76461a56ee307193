mod scenario;
mod transport;

pub mod runner;

pub use scenario::{Check, CheckFn, CheckOutcome, HttpScenario, Scenario, ScenarioResult};
pub use surge_http::{
    Error as HttpError, HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind,
};
pub use transport::Transport;
