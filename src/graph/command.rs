use crate::math::{Quat, Vec3};
use std::collections::HashMap;

/// Sum type backing a command's named parameters (§9 "command bus with arbitrary-typed
/// parameters"): each module filters on `address` against a small static set and reads
/// only the variants it expects.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandParam {
    Str(String),
    Int(i64),
    Float(f32),
    Bool(bool),
    Vector3(Vec3),
    Quaternion(Quat),
}

/// A self-describing command record: an address string (e.g. `/source/location`) plus
/// named parameters, dispatched synchronously to every module's command entry point.
#[derive(Clone, Debug, Default)]
pub struct Command {
    address: String,
    params: HashMap<String, CommandParam>,
}

impl Command {
    pub fn new(address: impl Into<String>) -> Self {
        Command { address: address.into(), params: HashMap::new() }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: CommandParam) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn string_param(&self, key: &str) -> Option<&str> {
        match self.params.get(key) {
            Some(CommandParam::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn float_param(&self, key: &str) -> Option<f32> {
        match self.params.get(key) {
            Some(CommandParam::Float(f)) => Some(*f),
            Some(CommandParam::Int(i)) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        match self.params.get(key) {
            Some(CommandParam::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn vector3_param(&self, key: &str) -> Option<Vec3> {
        match self.params.get(key) {
            Some(CommandParam::Vector3(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn quaternion_param(&self, key: &str) -> Option<Quat> {
        match self.params.get(key) {
            Some(CommandParam::Quaternion(q)) => Some(*q),
            _ => None,
        }
    }

    /// `true` when this command targets `id`, either via an explicit `sourceID` /
    /// `listenerID` parameter or because no target parameter was given at all (a
    /// broadcast command).
    pub fn targets(&self, id_key: &str, id: &str) -> bool {
        match self.string_param(id_key) {
            Some(target) => target == id,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_typed_parameters() {
        let cmd = Command::new("/source/location")
            .with_param("sourceID", CommandParam::Str("src-1".to_string()))
            .with_param("location", CommandParam::Vector3(Vec3::new(1.0, 2.0, 3.0)));

        assert_eq!(cmd.address(), "/source/location");
        assert_eq!(cmd.string_param("sourceID"), Some("src-1"));
        assert_eq!(cmd.vector3_param("location"), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn targets_defaults_to_broadcast_when_untargeted() {
        let cmd = Command::new("/listener/enableInterpolation");
        assert!(cmd.targets("listenerID", "any-listener"));
    }

    #[test]
    fn targets_filters_by_explicit_id() {
        let cmd = Command::new("/source/location")
            .with_param("sourceID", CommandParam::Str("src-1".to_string()));
        assert!(cmd.targets("sourceID", "src-1"));
        assert!(!cmd.targets("sourceID", "src-2"));
    }
}
