use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use surge_core::runner::{ProfileKind, Stage, TrafficProfile};
use surge_core::{Check, HttpScenario};

/// A scenario file: traffic profile, request and checks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioFileYaml {
    pub name: Option<String>,

    /// Executor kind: ramping-vus (default) | constant-arrival-rate
    pub executor: Option<String>,

    // ramping-vus
    #[serde(rename = "startVUs")]
    pub start_vus: Option<u64>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,

    // constant-arrival-rate
    pub rate: Option<u64>,
    #[serde(default)]
    pub time_unit: Option<YamlDuration>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,
    #[serde(rename = "preAllocatedVUs")]
    pub pre_allocated_vus: Option<u64>,
    #[serde(rename = "maxVUs")]
    pub max_vus: Option<u64>,

    pub request: RequestYaml,

    #[serde(default)]
    pub checks: Vec<CheckYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: u64,
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RequestYaml {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    pub port: Option<u16>,
    pub body: Option<String>,
    pub json: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct CheckYaml {
    pub name: String,
    pub status: Option<u16>,
    /// Inclusive `[min, max]`.
    pub status_in: Option<[u16; 2]>,
    /// Passes when the response carries this header.
    pub header: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| YamlDuration(Duration::from_secs(v)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// A scenario file resolved into core types.
#[derive(Debug, Clone)]
pub(crate) struct LoadedScenario {
    pub name: String,
    pub profile: TrafficProfile,
    pub scenario: HttpScenario,
}

pub(crate) async fn load_scenario_yaml(path: &Path) -> anyhow::Result<LoadedScenario> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read scenario YAML: {}", path.display()))?;

    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");

    parse_scenario_yaml(&text, default_name)
        .with_context(|| format!("invalid scenario file: {}", path.display()))
}

pub(crate) fn parse_scenario_yaml(
    text: &str,
    default_name: &str,
) -> anyhow::Result<LoadedScenario> {
    let doc: ScenarioFileYaml = serde_yaml::from_str(text).context("failed to parse YAML")?;

    let name = doc
        .name
        .clone()
        .unwrap_or_else(|| default_name.to_string());
    let profile = profile_from_yaml(&doc)?;
    profile.validate().context("invalid traffic profile")?;

    let mut scenario = request_from_yaml(doc.request)?;
    for check in doc.checks {
        scenario = scenario.with_check(check_from_yaml(check)?);
    }

    Ok(LoadedScenario {
        name,
        profile,
        scenario,
    })
}

fn profile_from_yaml(doc: &ScenarioFileYaml) -> anyhow::Result<TrafficProfile> {
    let kind = match doc.executor.as_deref() {
        Some(raw) => raw.parse::<ProfileKind>().map_err(|_| {
            anyhow::anyhow!(
                "unknown executor `{raw}` (expected ramping-vus or constant-arrival-rate)"
            )
        })?,
        None => ProfileKind::StagedConcurrency,
    };

    match kind {
        ProfileKind::StagedConcurrency => {
            let arrival_fields = [
                ("rate", doc.rate.is_some()),
                ("timeUnit", doc.time_unit.is_some()),
                ("duration", doc.duration.is_some()),
                ("preAllocatedVUs", doc.pre_allocated_vus.is_some()),
                ("maxVUs", doc.max_vus.is_some()),
            ];
            if let Some((field, _)) = arrival_fields.iter().find(|(_, set)| *set) {
                anyhow::bail!("`{field}` is only valid with `executor: constant-arrival-rate`");
            }

            Ok(TrafficProfile::StagedConcurrency {
                start_target: doc.start_vus.unwrap_or(0),
                stages: doc
                    .stages
                    .iter()
                    .map(|s| Stage::new(s.duration.into_inner(), s.target))
                    .collect(),
            })
        }
        ProfileKind::ConstantArrivalRate => {
            if !doc.stages.is_empty() || doc.start_vus.is_some() {
                anyhow::bail!("`stages`/`startVUs` are only valid with `executor: ramping-vus`");
            }

            let rate = doc.rate.context("`rate` is required for constant-arrival-rate")?;
            let duration = doc
                .duration
                .context("`duration` is required for constant-arrival-rate")?
                .into_inner();
            let pre_allocated = doc.pre_allocated_vus.unwrap_or(1);

            Ok(TrafficProfile::ConstantArrivalRate {
                rate,
                time_unit: doc
                    .time_unit
                    .map_or(Duration::from_secs(1), YamlDuration::into_inner),
                duration,
                pre_allocated,
                max: doc.max_vus.unwrap_or(pre_allocated),
            })
        }
    }
}

fn request_from_yaml(req: RequestYaml) -> anyhow::Result<HttpScenario> {
    let method = http::Method::from_bytes(req.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid request method `{}`", req.method))?;

    let mut scenario = HttpScenario::new(method, req.path);
    if let Some(port) = req.port {
        scenario = scenario.with_port(port);
    }

    let has_content_type = req
        .headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"));
    for (k, v) in req.headers {
        scenario = scenario.with_header(k, v);
    }

    match (req.body, req.json) {
        (Some(_), Some(_)) => anyhow::bail!("`request.body` and `request.json` are exclusive"),
        (Some(body), None) => scenario = scenario.with_body(body),
        (None, Some(json)) => {
            let body = serde_json::to_vec(&json).context("failed to encode `request.json`")?;
            scenario = scenario.with_body(body);
            if !has_content_type {
                scenario = scenario.with_header("content-type", "application/json");
            }
        }
        (None, None) => {}
    }

    Ok(scenario)
}

fn check_from_yaml(check: CheckYaml) -> anyhow::Result<Check> {
    let CheckYaml {
        name,
        status,
        status_in,
        header,
    } = check;

    match (status, status_in, header) {
        (Some(code), None, None) => Ok(Check::status_is(name, code)),
        (None, Some([min, max]), None) => {
            if min > max {
                anyhow::bail!("check `{name}`: `statusIn` must be [min, max]");
            }
            Ok(Check::status_in(name, min..=max))
        }
        (None, None, Some(header)) => Ok(Check::header_present(name, header)),
        _ => anyhow::bail!("check `{name}` must set exactly one of `status`, `statusIn`, `header`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_USER: &str = r#"
stages:
  - duration: 2m
    target: 200
  - duration: 1m
    target: 200
  - duration: 2m
    target: 0
request:
  path: /user
  port: 3000
checks:
  - name: status was 200
    status: 200
"#;

    const POST_USER: &str = r#"
name: create-user
executor: constant-arrival-rate
rate: 50
timeUnit: 1s
duration: 5m
preAllocatedVUs: 20
maxVUs: 100
request:
  method: post
  path: /user
  port: 3000
  json:
    first_name: john
    last_name: smith
checks:
  - name: status was 200
    status: 201
  - name: not a server error
    statusIn: [100, 499]
"#;

    fn parse(text: &str) -> LoadedScenario {
        parse_scenario_yaml(text, "file-stem").unwrap_or_else(|e| panic!("{e:#}"))
    }

    #[test]
    fn parses_staged_get_user() {
        let loaded = parse(GET_USER);

        assert_eq!(loaded.name, "file-stem");
        assert_eq!(
            loaded.profile,
            TrafficProfile::StagedConcurrency {
                start_target: 0,
                stages: vec![
                    Stage::new(Duration::from_secs(120), 200),
                    Stage::new(Duration::from_secs(60), 200),
                    Stage::new(Duration::from_secs(120), 0),
                ],
            }
        );
        assert_eq!(loaded.scenario.method(), http::Method::GET);
        assert_eq!(loaded.scenario.checks().len(), 1);
    }

    #[test]
    fn parses_constant_rate_post_user() {
        let loaded = parse(POST_USER);

        assert_eq!(loaded.name, "create-user");
        assert_eq!(
            loaded.profile,
            TrafficProfile::ConstantArrivalRate {
                rate: 50,
                time_unit: Duration::from_secs(1),
                duration: Duration::from_secs(300),
                pre_allocated: 20,
                max: 100,
            }
        );
        assert_eq!(loaded.scenario.method(), http::Method::POST);
        let names: Vec<&str> = loaded
            .scenario
            .checks()
            .iter()
            .map(|c| c.name().as_ref())
            .collect();
        assert_eq!(names, vec!["status was 200", "not a server error"]);
    }

    #[test]
    fn rejects_invalid_profiles() {
        let err = parse_scenario_yaml("stages: []\nrequest: { path: / }\n", "x").err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("stages")));

        let err = parse_scenario_yaml(
            "executor: constant-arrival-rate\nrate: 10\nduration: 1s\npreAllocatedVUs: 5\nmaxVUs: 2\nrequest: { path: / }\n",
            "x",
        )
        .err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("max_vus")));

        let err = parse_scenario_yaml(
            "executor: constant-arrival-rate\nduration: 1s\nrequest: { path: / }\n",
            "x",
        )
        .err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("`rate` is required")));

        let err = parse_scenario_yaml(
            "executor: ramping-arrival-rate\nrequest: { path: / }\n",
            "x",
        )
        .err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("unknown executor")));
    }

    #[test]
    fn rejects_ambiguous_checks_and_bodies() {
        let err = parse_scenario_yaml(
            "stages: [{ duration: 1s, target: 1 }]\nrequest: { path: / }\nchecks: [{ name: both, status: 200, header: etag }]\n",
            "x",
        )
        .err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("exactly one")));

        let err = parse_scenario_yaml(
            "stages: [{ duration: 1s, target: 1 }]\nrequest: { path: /, body: x, json: {} }\n",
            "x",
        )
        .err();
        assert!(err.is_some_and(|e| format!("{e:#}").contains("exclusive")));

        let err = parse_scenario_yaml(
            "stages: [{ duration: 1s, target: 1 }]\nrequest: { path: / }\nthresholds: {}\n",
            "x",
        )
        .err();
        assert!(err.is_some());
    }
}
