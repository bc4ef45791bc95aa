//! Persist the best score to disk (XDG config or ~/.config/snaketris).

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

const FILENAME: &str = "bestscore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestScore {
    pub username: String,
    pub score: u32,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed best score record: {0:?}")]
    Malformed(String),
}

/// Where the single best-score record lives.
pub trait ScoreStore {
    fn load_best(&self) -> Result<Option<BestScore>, StoreError>;
    fn save_best(&mut self, best: &BestScore) -> Result<(), StoreError>;
}

/// Outcome of handing a final score to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub best: Option<BestScore>,
    pub new_record: bool,
}

/// Compare `score` against the stored best and save it only if strictly greater.
/// An unreadable record counts as no record and gets overwritten.
pub fn submit(
    store: &mut dyn ScoreStore,
    username: &str,
    score: u32,
) -> Result<Standing, StoreError> {
    let current = match store.load_best() {
        Ok(current) => current,
        Err(err @ StoreError::Malformed(_)) => {
            tracing::warn!(%err, "replacing unreadable best score");
            None
        }
        Err(err) => return Err(err),
    };
    let beats = current.as_ref().is_none_or(|best| score > best.score);
    if !beats {
        return Ok(Standing {
            best: current,
            new_record: false,
        });
    }
    let best = BestScore {
        username: username.to_string(),
        score,
    };
    store.save_best(&best)?;
    tracing::info!(username, score, "new best score");
    Ok(Standing {
        best: Some(best),
        new_record: true,
    })
}

/// Returns the path to the best score file (config dir / snaketris / bestscore).
fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("snaketris").join(FILENAME)
}

/// One line: `<username> <score>`. The name may contain spaces.
fn parse_record(line: &str) -> Result<BestScore, StoreError> {
    let line = line.trim();
    let malformed = || StoreError::Malformed(line.to_string());
    let (name, score) = line.rsplit_once(char::is_whitespace).ok_or_else(malformed)?;
    let score = score.parse::<u32>().map_err(|_| malformed())?;
    let username = name.trim();
    if username.is_empty() {
        return Err(malformed());
    }
    Ok(BestScore {
        username: username.to_string(),
        score,
    })
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_env() -> Self {
        Self::new(config_path())
    }
}

impl ScoreStore for FileStore {
    /// A missing file means no best score yet.
    fn load_best(&self) -> Result<Option<BestScore>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match content.lines().find(|l| !l.trim().is_empty()) {
            Some(line) => parse_record(line).map(Some),
            None => Ok(None),
        }
    }

    /// Creates the config directory if needed.
    fn save_best(&mut self, best: &BestScore) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::File::create(&self.path)?;
        writeln!(f, "{} {}", best.username, best.score)?;
        Ok(())
    }
}

/// In-memory store; counts saves.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    best: Option<BestScore>,
    pub saves: usize,
}

#[cfg(test)]
impl ScoreStore for MemoryStore {
    fn load_best(&self) -> Result<Option<BestScore>, StoreError> {
        Ok(self.best.clone())
    }

    fn save_best(&mut self, best: &BestScore) -> Result<(), StoreError> {
        self.best = Some(best.clone());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_score_is_always_a_record() {
        let mut store = MemoryStore::default();
        let standing = submit(&mut store, "ada", 0).unwrap();
        assert!(standing.new_record);
        assert_eq!(store.saves, 1);
    }

    #[test]
    fn only_strictly_greater_overwrites() {
        let mut store = MemoryStore::default();
        submit(&mut store, "ada", 120).unwrap();
        let tie = submit(&mut store, "bob", 120).unwrap();
        assert!(!tie.new_record);
        assert_eq!(tie.best.as_ref().map(|b| b.username.as_str()), Some("ada"));
        let lower = submit(&mut store, "bob", 80).unwrap();
        assert!(!lower.new_record);
        let higher = submit(&mut store, "bob", 121).unwrap();
        assert!(higher.new_record);
        assert_eq!(store.saves, 2);
        assert_eq!(
            store.load_best().unwrap(),
            Some(BestScore {
                username: "bob".into(),
                score: 121
            })
        );
    }

    #[test]
    fn malformed_record_is_replaced_by_next_score() {
        let dir = std::env::temp_dir().join(format!("snaketris-bad-{}", std::process::id()));
        let path = dir.join(FILENAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, " 10\n").unwrap();
        let mut store = FileStore::new(path.clone());
        assert!(matches!(store.load_best(), Err(StoreError::Malformed(_))));
        let standing = submit(&mut store, "ada", 5).unwrap();
        assert!(standing.new_record);
        assert_eq!(fs::read_to_string(&path).unwrap(), "ada 5\n");
        assert!(!submit(&mut store, "bob", 3).unwrap().new_record);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn record_name_may_contain_spaces() {
        let best = parse_record("Ada Lovelace 360\n").unwrap();
        assert_eq!(best.username, "Ada Lovelace");
        assert_eq!(best.score, 360);
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(matches!(parse_record("ada"), Err(StoreError::Malformed(_))));
        assert!(matches!(parse_record("ada lots"), Err(StoreError::Malformed(_))));
        assert!(matches!(parse_record(" 12"), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn file_store_round_trips_and_treats_missing_as_empty() {
        let dir = std::env::temp_dir().join(format!("snaketris-test-{}", std::process::id()));
        let path = dir.join("nested").join(FILENAME);
        let mut store = FileStore::new(path.clone());
        assert_eq!(store.load_best().unwrap(), None);
        submit(&mut store, "grace hopper", 44).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "grace hopper 44\n");
        let best = store.load_best().unwrap().unwrap();
        assert_eq!((best.username.as_str(), best.score), ("grace hopper", 44));
        let _ = fs::remove_dir_all(dir);
    }
}
