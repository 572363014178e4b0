use perspectivedb_primitives::{Value, Version};
use thiserror::Error;

/// A hook transforms or drops an in-flight version during the remote
/// write path (spec §4.6). An ordered chain runs head-to-tail; the first
/// `None` short-circuits the rest.
pub trait Hook: Send + Sync {
    fn apply(&self, version: Version) -> Result<Option<Version>, HookError>;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HookError {
    #[error("hook rejected version: {0}")]
    Rejected(String),
}

/// Runs a hook chain over one version, short-circuiting on the first
/// hook that drops it.
pub fn run_chain(hooks: &[Box<dyn Hook>], version: Version) -> Result<Option<Version>, HookError> {
    let mut current = version;
    for hook in hooks {
        match hook.apply(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// The built-in "hide" hook (spec §4.6): strips the named top-level
/// attribute paths from a version's body, synthesized whenever
/// `hooksOpts.hide` names attributes to redact before a perspective sees
/// them.
pub struct Hide {
    paths: Vec<String>,
}

impl Hide {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Hook for Hide {
    fn apply(&self, mut version: Version) -> Result<Option<Version>, HookError> {
        if let Some(Value::Map(entries)) = version.b.as_mut() {
            entries.retain(|(key, _)| !self.paths.iter().any(|hidden| hidden == key));
        }
        Ok(Some(version))
    }
}

/// Convenience constructor mirroring the spec's `hooksOpts.hide` shorthand.
pub fn hide<I, S>(paths: I) -> Box<dyn Hook>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Box::new(Hide::new(paths))
}
