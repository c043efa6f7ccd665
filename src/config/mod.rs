use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    /// Defaults, then the rc file at `config_path`, then the environment.
    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        if let Ok(file) = fs::File::open(&config_path) {
            merge_rc(&mut map, BufReader::new(file));
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned().filter(|v| !v.is_empty())
    }

    /// Override a key for this process, e.g. from a CLI flag.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("REQUEST_TIMEOUT").unwrap_or(60))
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("EXECUTION_TIMEOUT").unwrap_or(30))
    }

    pub fn log_path(&self) -> PathBuf {
        self.get_path("LOG_PATH")
            .unwrap_or_else(|| env::temp_dir().join("codepad").join("codepad.log"))
    }
}

fn merge_rc(map: &mut HashMap<String, String>, reader: impl BufRead) {
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or CODEPAD_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "EXECUTE_BACKEND",
        "EXECUTE_URL",
        "GENERATE_BACKEND",
        "GENERATE_URL",
        "PYTHON_BIN",
        "EXECUTION_TIMEOUT",
        "REQUEST_TIMEOUT",
        "API_BASE_URL",
        "DEFAULT_MODEL",
        "LOG_PATH",
    ];

    KEYS.contains(&k) || k.starts_with("CODEPAD_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| Path::new("~/.config").to_path_buf());
    base.join("codepad").join(".codepadrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Backends
    m.insert("EXECUTE_BACKEND".into(), "python".into());
    m.insert("GENERATE_BACKEND".into(), "llm".into());
    m.insert("PYTHON_BIN".into(), "python3".into());

    // Numbers
    m.insert("EXECUTION_TIMEOUT".into(), "30".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rc_lines_override_defaults() {
        let mut map = default_map();
        let rc = "# backends\nEXECUTE_BACKEND = http\n\nEXECUTE_URL=http://localhost:5000/execute\nnot a pair\n";
        merge_rc(&mut map, rc.as_bytes());
        assert_eq!(map["EXECUTE_BACKEND"], "http");
        assert_eq!(map["EXECUTE_URL"], "http://localhost:5000/execute");
        assert_eq!(map["GENERATE_BACKEND"], "llm");
    }

    #[test]
    fn load_from_reads_rc_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".codepadrc");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "CODEPAD_TEST_ONLY_KEY=from-file").unwrap();
        writeln!(f, "EXECUTION_TIMEOUT=5").unwrap();

        let cfg = Config::load_from(path.clone());
        assert_eq!(cfg.config_path, path);
        assert_eq!(cfg.get("CODEPAD_TEST_ONLY_KEY").as_deref(), Some("from-file"));
        assert!(cfg.get("NOT_A_KEY").is_none());
    }

    #[test]
    fn typed_getters_fall_back() {
        let mut cfg = Config::load_from(PathBuf::from("/nonexistent/.codepadrc"));
        cfg.set("REQUEST_TIMEOUT", "not-a-number");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(60));
        cfg.set("EXECUTION_TIMEOUT", "7");
        assert_eq!(cfg.execution_timeout(), Duration::from_secs(7));
        cfg.set("EXECUTE_URL", "");
        assert!(cfg.get("EXECUTE_URL").is_none());
    }
}
