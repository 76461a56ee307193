use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use surge_http::HttpResponse;

pub type CheckFn = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync + 'static>;

/// A named assertion evaluated against every response.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    predicate: CheckFn,
}

impl Check {
    pub fn new<F>(name: impl Into<Arc<str>>, predicate: F) -> Self
    where
        F: Fn(&HttpResponse) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn status_is(name: impl Into<Arc<str>>, status: u16) -> Self {
        Self::new(name, move |res| res.status == status)
    }

    pub fn status_in(name: impl Into<Arc<str>>, range: RangeInclusive<u16>) -> Self {
        Self::new(name, move |res| range.contains(&res.status))
    }

    pub fn header_present(name: impl Into<Arc<str>>, header: impl Into<String>) -> Self {
        let header = header.into();
        Self::new(name, move |res| res.header(&header).is_some())
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn evaluate(&self, res: &HttpResponse) -> bool {
        (self.predicate)(res)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_checks() {
        let mut res = HttpResponse::new(201);
        res.headers
            .push(("location".to_string(), "/user/1".to_string()));

        assert!(Check::status_is("created", 201).evaluate(&res));
        assert!(!Check::status_is("ok", 200).evaluate(&res));
        assert!(Check::status_in("2xx", 200..=299).evaluate(&res));
        assert!(!Check::status_in("4xx", 400..=499).evaluate(&res));
        assert!(Check::header_present("has location", "Location").evaluate(&res));
        assert!(!Check::header_present("has etag", "etag").evaluate(&res));
    }

    #[test]
    fn custom_predicate() {
        let check = Check::new("non-empty body", |res: &HttpResponse| !res.body.is_empty());
        assert_eq!(check.name().as_ref(), "non-empty body");
        assert!(!check.evaluate(&HttpResponse::new(200)));
    }
}
