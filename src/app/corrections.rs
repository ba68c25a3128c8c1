use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Transcript document fields that corrections are applied to.
pub(crate) const CORRECTABLE_FIELDS: [&str; 4] =
    ["sub_title", "detailed_description", "summary", "transcript"];

/// One find/replace rule, as stored in the corrections dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Correction {
    pub(crate) wrong: String,
    pub(crate) correct: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default = "enabled_by_default")]
    pub(crate) enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Correction {
    pub(crate) fn from_pair(wrong: &str, correct: &str) -> Self {
        Self {
            wrong: wrong.to_string(),
            correct: correct.to_string(),
            description: format!("command line: {wrong} -> {correct}"),
            enabled: true,
        }
    }

    fn label(&self) -> String {
        if self.description.trim().is_empty() {
            format!("{} -> {}", self.wrong, self.correct)
        } else {
            self.description.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CorrectionsFile {
    #[serde(default)]
    corrections: Vec<Correction>,
}

/// Enabled rules from the dictionary file. A missing file has no rules.
pub(crate) fn load_corrections(path: &Path) -> Result<Vec<Correction>> {
    if !path.exists() {
        log::warn!("corrections dictionary {} not found", path.display());
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: CorrectionsFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid corrections dictionary {}", path.display()))?;
    Ok(file
        .corrections
        .into_iter()
        .filter(|correction| correction.enabled)
        .filter(|correction| {
            if correction.wrong.is_empty() {
                log::warn!("skipping correction with an empty `wrong` value");
            }
            !correction.wrong.is_empty()
        })
        .collect())
}

/// Command-line pairs first, then the dictionary when asked for or when no
/// pairs were given.
pub(crate) fn collect_corrections(
    wrong: &[String],
    correct: &[String],
    use_dict: bool,
    dict_path: &Path,
) -> Result<Vec<Correction>> {
    if wrong.len() != correct.len() {
        bail!(
            "--wrong ({}) and --correct ({}) must be given in pairs",
            wrong.len(),
            correct.len()
        );
    }

    let mut corrections: Vec<Correction> = wrong
        .iter()
        .zip(correct)
        .filter(|(wrong, _)| !wrong.is_empty())
        .map(|(wrong, correct)| Correction::from_pair(wrong, correct))
        .collect();
    if use_dict || wrong.is_empty() {
        corrections.extend(load_corrections(dict_path)?);
    }
    if corrections.is_empty() {
        bail!(
            "no corrections: pass --wrong/--correct or add rules to {}",
            dict_path.display()
        );
    }
    Ok(corrections)
}

/// Applies every rule whose `wrong` text occurs; returns the new text and the
/// labels of the rules that matched.
pub(crate) fn apply_corrections(text: &str, corrections: &[Correction]) -> (String, Vec<String>) {
    let mut text = text.to_string();
    let mut applied = Vec::new();
    for correction in corrections {
        if !correction.wrong.is_empty() && text.contains(&correction.wrong) {
            text = text.replace(&correction.wrong, &correction.correct);
            applied.push(correction.label());
        }
    }
    (text, applied)
}

/// What changed in one transcript file.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileFix {
    pub(crate) path: PathBuf,
    /// Matched rules per field, in field order.
    pub(crate) fields: Vec<(&'static str, usize)>,
    pub(crate) backup: Option<PathBuf>,
}

impl FileFix {
    pub(crate) fn total(&self) -> usize {
        self.fields.iter().map(|(_, count)| count).sum()
    }

    pub(crate) fn modified(&self) -> bool {
        self.total() > 0
    }
}

fn backup_path(path: &Path, backup_dir: &Path, now: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    backup_dir.join(format!("{stem}_{}{ext}", now.format("%Y%m%d_%H%M%S")))
}

/// Applies the rules to one transcript document. Unless dry-running, a
/// modified file is first copied into `backup_dir` with a timestamp.
pub(crate) fn fix_transcript_file(
    path: &Path,
    corrections: &[Correction],
    backup_dir: &Path,
    dry_run: bool,
    now: NaiveDateTime,
) -> Result<FileFix> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut document: Map<String, Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;

    let mut fix = FileFix {
        path: path.to_path_buf(),
        ..FileFix::default()
    };
    for field in CORRECTABLE_FIELDS {
        let Some(Value::String(text)) = document.get_mut(field) else {
            continue;
        };
        let (fixed, applied) = apply_corrections(text, corrections);
        if applied.is_empty() {
            continue;
        }
        log::debug!("{}: {field}: {}", path.display(), applied.join(", "));
        fix.fields.push((field, applied.len()));
        if !dry_run {
            *text = fixed;
        }
    }

    if fix.modified() && !dry_run {
        fs::create_dir_all(backup_dir)
            .with_context(|| format!("failed to create {}", backup_dir.display()))?;
        let backup = backup_path(path, backup_dir, now);
        fs::copy(path, &backup)
            .with_context(|| format!("failed to back up {}", path.display()))?;
        fs::write(path, serde_json::to_string_pretty(&document)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!(
            "corrected {} ({} changes, backup {})",
            path.display(),
            fix.total(),
            backup.display()
        );
        fix.backup = Some(backup);
    }
    Ok(fix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FixTarget {
    Episode(String),
    File(String),
    All,
}

/// Transcript files selected by `target` inside `dir`.
pub(crate) fn target_files(dir: &Path, target: &FixTarget) -> Result<Vec<PathBuf>> {
    let single = match target {
        FixTarget::Episode(number) => format!("ep{number}.json"),
        FixTarget::File(name) => name.clone(),
        FixTarget::All => {
            let entries = fs::read_dir(dir)
                .with_context(|| format!("failed to list {}", dir.display()))?;
            let mut files = Vec::new();
            for entry in entries {
                let path = entry?.path();
                let is_transcript = path.file_name().and_then(|name| name.to_str()).is_some_and(
                    |name| name.starts_with("ep") && name.ends_with(".json"),
                );
                if is_transcript && path.is_file() {
                    files.push(path);
                }
            }
            files.sort();
            return Ok(files);
        }
    };

    let path = dir.join(&single);
    if !path.is_file() {
        bail!("transcript file not found: {}", path.display());
    }
    Ok(vec![path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 20)
            .and_then(|date| date.and_hms_opt(9, 5, 7))
            .expect("valid timestamp")
    }

    fn rules() -> Vec<Correction> {
        vec![
            Correction::from_pair("井戸畑", "井戸端"),
            Correction {
                wrong: "シビテク".into(),
                correct: "シビックテック".into(),
                description: "abbreviation".into(),
                enabled: true,
            },
        ]
    }

    fn write_transcript(dir: &Path) -> PathBuf {
        let path = dir.join("ep1.0.18.json");
        let document = serde_json::json!({
            "transcript": "井戸畑キャストです。井戸畑へようこそ。",
            "summary": "シビテクの話",
            "sub_title": "変更なし",
            "speaker_notes": "井戸畑",
        });
        fs::write(&path, serde_json::to_string_pretty(&document).expect("json"))
            .expect("write transcript");
        path
    }

    #[test]
    fn corrections_replace_every_occurrence() {
        let (text, applied) = apply_corrections("井戸畑で井戸畑を語る", &rules());
        assert_eq!(text, "井戸端で井戸端を語る");
        assert_eq!(applied, vec!["command line: 井戸畑 -> 井戸端"]);

        let (text, applied) = apply_corrections("", &rules());
        assert!(text.is_empty() && applied.is_empty());
    }

    #[test]
    fn dictionary_keeps_enabled_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corrections.json");
        fs::write(
            &path,
            r#"{"corrections": [
                {"wrong": "井戸畑", "correct": "井戸端", "description": "name"},
                {"wrong": "off", "correct": "on", "enabled": false},
                {"wrong": "", "correct": "everywhere"}
            ]}"#,
        )
        .expect("write dictionary");

        let rules = load_corrections(&path).expect("dictionary loads");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description, "name");
        assert!(load_corrections(&dir.path().join("absent.json"))
            .expect("missing dictionary is empty")
            .is_empty());
    }

    #[test]
    fn pairs_and_dictionary_combine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dict = dir.path().join("corrections.json");
        fs::write(&dict, r#"{"corrections": [{"wrong": "a", "correct": "b"}]}"#)
            .expect("write dictionary");
        let wrong = vec!["x".to_string()];
        let correct = vec!["y".to_string()];

        assert_eq!(collect_corrections(&wrong, &correct, false, &dict).expect("pairs").len(), 1);
        assert_eq!(collect_corrections(&wrong, &correct, true, &dict).expect("both").len(), 2);
        assert_eq!(collect_corrections(&[], &[], false, &dict).expect("dictionary").len(), 1);

        let err = collect_corrections(&wrong, &[], false, &dict).expect_err("unpaired");
        assert!(err.to_string().contains("pairs"));
        let err = collect_corrections(&[], &[], false, &dir.path().join("absent.json"))
            .expect_err("no rules");
        assert!(err.to_string().contains("no corrections"));
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_transcript(dir.path());
        let before = fs::read_to_string(&path).expect("read transcript");
        let backups = dir.path().join("backup");

        let fix = fix_transcript_file(&path, &rules(), &backups, true, now()).expect("dry run");

        assert_eq!(fix.fields, vec![("summary", 1), ("transcript", 1)]);
        assert_eq!(fix.total(), 2);
        assert!(fix.backup.is_none());
        assert_eq!(fs::read_to_string(&path).expect("read transcript"), before);
        assert!(!backups.exists());
    }

    #[test]
    fn fixing_backs_up_then_rewrites_target_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_transcript(dir.path());
        let before = fs::read_to_string(&path).expect("read transcript");
        let backups = dir.path().join("transcripts_backup");

        let fix = fix_transcript_file(&path, &rules(), &backups, false, now()).expect("fix");

        let backup = fix.backup.expect("backup is written");
        assert_eq!(backup, backups.join("ep1.0.18_20260120_090507.json"));
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), before);

        let fixed: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read fixed")).expect("json");
        assert_eq!(fixed["transcript"], "井戸端キャストです。井戸端へようこそ。");
        assert_eq!(fixed["summary"], "シビックテックの話");
        assert_eq!(fixed["sub_title"], "変更なし");
        assert_eq!(fixed["speaker_notes"], "井戸畑");
    }

    #[test]
    fn untouched_files_are_not_backed_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ep1.0.1.json");
        fs::write(&path, r#"{"transcript": "clean"}"#).expect("write transcript");
        let backups = dir.path().join("backup");

        let fix = fix_transcript_file(&path, &rules(), &backups, false, now()).expect("fix");
        assert!(!fix.modified());
        assert!(!backups.exists());
    }

    #[test]
    fn targets_resolve_inside_transcript_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["ep1.0.2.json", "ep1.0.1.json", "notes.json", "ep1.0.3.txt"] {
            fs::write(dir.path().join(name), "{}").expect("write file");
        }

        let all = target_files(dir.path(), &FixTarget::All).expect("list");
        assert_eq!(
            all,
            vec![dir.path().join("ep1.0.1.json"), dir.path().join("ep1.0.2.json")]
        );
        assert_eq!(
            target_files(dir.path(), &FixTarget::Episode("1.0.2".into())).expect("episode"),
            vec![dir.path().join("ep1.0.2.json")]
        );
        assert!(target_files(dir.path(), &FixTarget::File("ep9.9.9.json".into())).is_err());
    }
}
