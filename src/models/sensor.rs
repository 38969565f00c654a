use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Where a sensor line gets its text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Cpu,
    Gpu,
    Temp,
    Join,
}

impl Provider {
    /// Providers that read a single value. Only these may appear inside a join.
    pub fn is_leaf(self) -> bool {
        !matches!(self, Provider::Join)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Provider::Cpu),
            "gpu" => Ok(Provider::Gpu),
            "temp" => Ok(Provider::Temp),
            "join" => Ok(Provider::Join),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Cpu => "cpu",
            Provider::Gpu => "gpu",
            Provider::Temp => "temp",
            Provider::Join => "join",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SensorSpec {
    pub name: String,
    pub provider: Provider,
    pub enabled: bool,
    pub params: IndexMap<String, String>,
    pub children: Vec<SensorSpec>,
}

impl SensorSpec {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            enabled: true,
            params: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn join(name: impl Into<String>, children: Vec<SensorSpec>) -> Self {
        Self {
            children,
            ..Self::new(name, Provider::Join)
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    /// A sensor is rendered as a composite whenever it carries children,
    /// whatever its own provider says.
    pub fn is_composite(&self) -> bool {
        self.provider == Provider::Join || !self.children.is_empty()
    }
}
