use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::{
    entries::{parse_entries, Entry, ParseIssue},
    file_key, Provider,
};
use crate::{
    diagnostics::Diagnostics,
    models::{CollectionMap, GameAssets, GameMap, GameMetadata},
};

const COLLECTION_FILES: [&str; 2] = ["collections.pegasus.txt", "collections.txt"];
const METADATA_FILES: [&str; 2] = ["metadata.pegasus.txt", "metadata.txt"];
const MEDIA_DIR: &str = "media";
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// Default directory depth searched below each game directory.
pub const DEFAULT_SCAN_DEPTH: usize = 4;

/// Scans game directories described by a `collections.txt` file.
///
/// Each directory lists its collections and the rules selecting their files
/// (extensions, a regex, explicit files). Games are keyed by canonical file
/// path. During enhance, `metadata.txt` in the same directory and images
/// under `media/<file stem>/` are attached to the games found there.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    game_dirs: Vec<PathBuf>,
    max_depth: usize,
}

impl DirectoryProvider {
    /// Diagnostics source name.
    pub const NAME: &'static str = "directory";

    /// Create a provider over the given game directories.
    pub fn new<I, P>(game_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            game_dirs: game_dirs.into_iter().map(Into::into).collect(),
            max_depth: DEFAULT_SCAN_DEPTH,
        }
    }

    /// Limit how deep below each game directory files are searched.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Directories scanned by this provider.
    pub fn game_dirs(&self) -> &[PathBuf] {
        &self.game_dirs
    }

    fn find_in_dir(
        &self,
        dir: &Path,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        if !dir.is_dir() {
            diagnostics.report(
                Self::NAME,
                format!("game directory {} does not exist", dir.display()),
            );
            return Ok(());
        }

        let Some(path) = first_existing(dir, &COLLECTION_FILES) else {
            diagnostics.report(
                Self::NAME,
                format!("no collection file found in {}", dir.display()),
            );
            return Ok(());
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let specs = read_collection_specs(&content, &path, diagnostics);

        let mut matched: Vec<Vec<PathBuf>> = vec![Vec::new(); specs.len()];
        for (idx, spec) in specs.iter().enumerate() {
            for file in &spec.files {
                let candidate = dir.join(file);
                if candidate.is_file() {
                    matched[idx].push(candidate);
                } else {
                    diagnostics.report(
                        Self::NAME,
                        format!(
                            "{}:{}: file `{}` of collection `{}` does not exist",
                            path.display(),
                            spec.line,
                            file,
                            spec.short_name()
                        ),
                    );
                }
            }
        }

        if specs.iter().any(CollectionSpec::scans) {
            let walker = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(self.max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !is_media_dir(entry));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        diagnostics.report(
                            Self::NAME,
                            format!("failed to scan {}: {err}", dir.display()),
                        );
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = relative_path(dir, entry.path());
                if is_config_file(&relative) {
                    continue;
                }
                for (idx, spec) in specs.iter().enumerate() {
                    if spec.matches(&relative, entry.path())
                        && !matched[idx].iter().any(|known| known == entry.path())
                    {
                        matched[idx].push(entry.path().to_path_buf());
                    }
                }
            }
        }

        let mut linked = 0;
        for (spec, files) in specs.iter().zip(matched) {
            let collection = collections.add_or_get(spec.short_name());
            collection.fill_details(Some(spec.name.clone()), spec.launch.clone());
            for file in files {
                let (canonical, key) = file_key(&file);
                games.add_or_get(key.clone()).add_file(canonical);
                collection.add_game(key);
                linked += 1;
            }
        }
        debug!(dir = %dir.display(), collections = specs.len(), files = linked, "scanned game directory");
        Ok(())
    }

    fn enhance_in_dir(
        &self,
        dir: &Path,
        games: &mut GameMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }

        if let Some(path) = first_existing(dir, &METADATA_FILES) {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            for block in read_metadata_blocks(&content, dir, &path, diagnostics) {
                if block.files.is_empty() {
                    diagnostics.report(
                        Self::NAME,
                        format!("{}:{}: metadata entry has no file", path.display(), block.line),
                    );
                    continue;
                }

                let mut applied = false;
                for file in &block.files {
                    let (_, key) = file_key(&dir.join(file));
                    if let Some(game) = games.get_mut(&key) {
                        game.metadata.merge(block.metadata.clone());
                        applied = true;
                    }
                }
                if !applied {
                    diagnostics.report(
                        Self::NAME,
                        format!(
                            "{}:{}: no game found for `{}`",
                            path.display(),
                            block.line,
                            block.files.join(", ")
                        ),
                    );
                }
            }
        }

        let media_root = dir.join(MEDIA_DIR);
        if media_root.is_dir() {
            let canonical_dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
            for game in games.iter_mut() {
                let stem = match game.primary_file() {
                    Some(primary) if primary.starts_with(&canonical_dir) => {
                        primary.file_stem().map(ToOwned::to_owned)
                    }
                    _ => None,
                };
                if let Some(stem) = stem {
                    let assets = find_media(&media_root.join(stem));
                    game.metadata.assets.merge(assets);
                }
            }
        }

        Ok(())
    }
}

impl Provider for DirectoryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn find(
        &self,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        for dir in &self.game_dirs {
            if let Err(err) = self.find_in_dir(dir, games, collections, diagnostics) {
                diagnostics.report_error(Self::NAME, &err);
            }
        }
        Ok(())
    }

    fn enhance(
        &self,
        games: &mut GameMap,
        _collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        for dir in &self.game_dirs {
            if let Err(err) = self.enhance_in_dir(dir, games, diagnostics) {
                diagnostics.report_error(Self::NAME, &err);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct CollectionSpec {
    line: usize,
    name: String,
    short_name: Option<String>,
    launch: Option<String>,
    extensions: Vec<String>,
    files: Vec<String>,
    regex: Option<Regex>,
    ignored: Vec<String>,
}

impl CollectionSpec {
    fn new(line: usize, name: String) -> Self {
        Self {
            line,
            name,
            short_name: None,
            launch: None,
            extensions: Vec::new(),
            files: Vec::new(),
            regex: None,
            ignored: Vec::new(),
        }
    }

    fn short_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    fn scans(&self) -> bool {
        !self.extensions.is_empty() || self.regex.is_some()
    }

    fn matches(&self, relative: &str, path: &Path) -> bool {
        if self.ignored.iter().any(|ignored| ignored == relative) {
            return false;
        }
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        by_extension
            || self
                .regex
                .as_ref()
                .map(|re| re.is_match(relative))
                .unwrap_or(false)
    }
}

fn read_collection_specs(
    content: &str,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Vec<CollectionSpec> {
    let (entries, issues) = parse_entries(content);
    report_issues(path, issues, diagnostics);

    let mut specs: Vec<CollectionSpec> = Vec::new();
    for entry in entries {
        if entry.key == "collection" {
            specs.push(CollectionSpec::new(entry.line, entry.text()));
            continue;
        }

        let Some(spec) = specs.last_mut() else {
            report_entry(path, &entry, "appears before any `collection` entry", diagnostics);
            continue;
        };
        match entry.key.as_str() {
            "shortname" => spec.short_name = Some(entry.text()),
            "launch" | "command" => spec.launch = Some(entry.text()),
            "extension" | "extensions" => spec.extensions.extend(
                entry
                    .list()
                    .into_iter()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase()),
            ),
            "file" | "files" => spec.files.extend(entry.values.iter().cloned()),
            "ignore-file" | "ignore-files" => spec.ignored.extend(entry.values.iter().cloned()),
            "regex" => match Regex::new(&entry.text()) {
                Ok(re) => spec.regex = Some(re),
                Err(err) => report_entry(path, &entry, &format!("invalid regex: {err}"), diagnostics),
            },
            _ => report_entry(path, &entry, "unrecognized key", diagnostics),
        }
    }

    specs.retain(|spec| {
        if spec.short_name().trim().is_empty() {
            diagnostics.report(
                DirectoryProvider::NAME,
                format!("{}:{}: collection without a name", path.display(), spec.line),
            );
            return false;
        }
        true
    });
    specs
}

#[derive(Debug)]
struct MetadataBlock {
    line: usize,
    // `game:` blocks collect every following `file:` line
    named: bool,
    files: Vec<String>,
    metadata: GameMetadata,
}

impl MetadataBlock {
    fn new(line: usize) -> Self {
        Self {
            line,
            named: false,
            files: Vec::new(),
            metadata: GameMetadata::default(),
        }
    }
}

fn read_metadata_blocks(
    content: &str,
    dir: &Path,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Vec<MetadataBlock> {
    let (entries, issues) = parse_entries(content);
    report_issues(path, issues, diagnostics);

    let mut blocks: Vec<MetadataBlock> = Vec::new();
    for entry in entries {
        match entry.key.as_str() {
            "game" => {
                let mut block = MetadataBlock::new(entry.line);
                block.named = true;
                block.metadata.title = Some(entry.text());
                blocks.push(block);
                continue;
            }
            "file" | "files" => {
                let opens_block = blocks
                    .last()
                    .map(|b| !b.named && !b.files.is_empty())
                    .unwrap_or(true);
                if opens_block {
                    blocks.push(MetadataBlock::new(entry.line));
                }
                if let Some(block) = blocks.last_mut() {
                    block.files.extend(entry.values.iter().cloned());
                }
                continue;
            }
            _ => {}
        }

        let Some(block) = blocks.last_mut() else {
            report_entry(path, &entry, "appears before any `game` or `file` entry", diagnostics);
            continue;
        };
        if let Err(message) = apply_metadata_entry(&mut block.metadata, &entry, dir) {
            report_entry(path, &entry, &message, diagnostics);
        }
    }
    blocks
}

fn apply_metadata_entry(
    metadata: &mut GameMetadata,
    entry: &Entry,
    dir: &Path,
) -> std::result::Result<(), String> {
    let text = entry.text();
    match entry.key.as_str() {
        "title" => metadata.title = Some(text),
        "developer" | "developers" => metadata.developer = Some(text),
        "publisher" | "publishers" => metadata.publisher = Some(text),
        "genre" | "genres" => metadata.genre = Some(text),
        "summary" | "description" => metadata.description = Some(text),
        "launch" | "command" => metadata.launch = Some(text),
        "workdir" | "cwd" => metadata.workdir = Some(dir.join(text)),
        "players" => {
            metadata.players =
                Some(parse_players(&text).ok_or_else(|| format!("invalid player count `{text}`"))?)
        }
        "rating" => {
            metadata.rating =
                Some(parse_rating(&text).ok_or_else(|| format!("invalid rating `{text}`"))?)
        }
        "release" => {
            metadata.release =
                Some(parse_release(&text).ok_or_else(|| format!("invalid release date `{text}`"))?)
        }
        "assets.box_front" | "assets.boxfront" => metadata.assets.box_front = Some(dir.join(text)),
        "assets.logo" => metadata.assets.logo = Some(dir.join(text)),
        "assets.screenshot" | "assets.screenshots" => metadata
            .assets
            .screenshots
            .extend(entry.values.iter().map(|value| dir.join(value))),
        _ => return Err("unrecognized key".to_string()),
    }
    Ok(())
}

/// `80%` or `0.8`, clamped to the unit range.
fn parse_rating(text: &str) -> Option<f32> {
    let text = text.trim();
    let value = match text.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f32>().ok()? / 100.0,
        None => text.parse::<f32>().ok()?,
    };
    (0.0..=1.0).contains(&value).then_some(value)
}

/// `YYYY-MM-DD`, `YYYY-MM` or `YYYY`; missing parts default to the first.
fn parse_release(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(1);
    let day = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `2` or a range such as `1-4`, taking the maximum.
fn parse_players(text: &str) -> Option<u32> {
    let upper = text.rsplit('-').next()?.trim();
    upper.parse::<u32>().ok().filter(|count| *count > 0)
}

fn find_media(dir: &Path) -> GameAssets {
    let mut assets = GameAssets::default();
    let Ok(read_dir) = fs::read_dir(dir) else {
        return assets;
    };
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    for path in files {
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_lowercase()
            .replace(['_', '-'], "");
        match stem.as_str() {
            "boxfront" if assets.box_front.is_none() => assets.box_front = Some(path),
            "logo" if assets.logo.is_none() => assets.logo = Some(path),
            other if other.starts_with("screenshot") => assets.screenshots.push(path),
            _ => {}
        }
    }
    assets
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn is_media_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == MEDIA_DIR
}

fn is_config_file(relative: &str) -> bool {
    COLLECTION_FILES.contains(&relative) || METADATA_FILES.contains(&relative)
}

fn relative_path(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn report_issues(path: &Path, issues: Vec<ParseIssue>, diagnostics: &mut Diagnostics) {
    for issue in issues {
        diagnostics.report(
            DirectoryProvider::NAME,
            format!("{}:{}: {}", path.display(), issue.line, issue.message),
        );
    }
}

fn report_entry(path: &Path, entry: &Entry, message: &str, diagnostics: &mut Diagnostics) {
    diagnostics.report(
        DirectoryProvider::NAME,
        format!("{}:{}: `{}` {}", path.display(), entry.line, entry.key, message),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_arcade_dir(root: &Path) -> Result<()> {
        fs::write(
            root.join("collections.txt"),
            "\
collection: Arcade Classics
shortname: arcade
extensions: zip
launch: mame {file.basename}
ignore-file: bios.zip

collection: Manuals
regex: ^docs/.*\\.pdf$
",
        )?;
        fs::write(
            root.join("metadata.txt"),
            "\
file: galaga.zip
title: Galaga

file: missing.zip
title: Nobody

game: Pac-Man
file: pacman.zip
developer: Namco
rating: 90%
release: 1980-05-22
players: 1-2
description: Eat dots.
  Avoid ghosts.
",
        )?;
        for name in ["pacman.zip", "galaga.zip", "bios.zip", "readme.md"] {
            fs::write(root.join(name), b"rom")?;
        }
        fs::create_dir_all(root.join("docs"))?;
        fs::write(root.join("docs/pacman.pdf"), b"pdf")?;
        fs::create_dir_all(root.join("media/pacman"))?;
        fs::write(root.join("media/pacman/boxFront.png"), b"png")?;
        fs::write(root.join("media/pacman/screenshot1.png"), b"png")?;
        fs::write(root.join("media/pacman/notes.txt"), b"txt")?;
        Ok(())
    }

    #[test]
    fn finds_games_by_extension_and_regex() -> Result<()> {
        let temp = tempdir()?;
        write_arcade_dir(temp.path())?;

        let provider = DirectoryProvider::new([temp.path()]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let arcade = collections.get("arcade").expect("arcade collection");
        assert_eq!(arcade.name.as_deref(), Some("Arcade Classics"));
        assert_eq!(arcade.launch.as_deref(), Some("mame {file.basename}"));
        assert_eq!(arcade.game_count(), 2);
        assert!(arcade.game_keys().all(|key| !key.ends_with("bios.zip")));

        let manuals = collections.get("manuals").expect("manuals collection");
        assert_eq!(manuals.game_count(), 1);
        assert_eq!(games.len(), 3);
        Ok(())
    }

    #[test]
    fn enhance_attaches_metadata_and_media() -> Result<()> {
        let temp = tempdir()?;
        write_arcade_dir(temp.path())?;

        let provider = DirectoryProvider::new([temp.path()]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;
        provider.enhance(&mut games, &mut collections, &mut diagnostics)?;
        provider.enhance(&mut games, &mut collections, &mut diagnostics)?;

        let (_, pacman_key) = file_key(&temp.path().join("pacman.zip"));
        let pacman = games.get(&pacman_key).expect("pac-man game");
        assert_eq!(pacman.title(), "Pac-Man");
        assert_eq!(pacman.metadata.developer.as_deref(), Some("Namco"));
        assert_eq!(pacman.metadata.rating, Some(0.9));
        assert_eq!(pacman.metadata.players, Some(2));
        assert_eq!(pacman.metadata.release, NaiveDate::from_ymd_opt(1980, 5, 22));
        assert_eq!(
            pacman.metadata.description.as_deref(),
            Some("Eat dots. Avoid ghosts.")
        );
        assert!(pacman.metadata.assets.box_front.is_some());
        assert_eq!(pacman.metadata.assets.screenshots.len(), 1);

        let (_, galaga_key) = file_key(&temp.path().join("galaga.zip"));
        assert_eq!(games.get(&galaga_key).map(|g| g.title()), Some("Galaga"));

        // one report for missing.zip per enhance pass
        let missing: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.message.contains("missing.zip"))
            .collect();
        assert_eq!(missing.len(), 2);
        Ok(())
    }

    #[test]
    fn game_block_keeps_all_of_its_files() {
        let mut diagnostics = Diagnostics::new();
        let blocks = read_metadata_blocks(
            "file: tails.bin\nfile: knuckles.bin\n\ngame: Sonic CD\nfile: disc1.bin\nfile: disc2.bin\ndeveloper: Sega\n",
            Path::new("/games"),
            Path::new("/games/metadata.txt"),
            &mut diagnostics,
        );

        assert!(diagnostics.is_empty());
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].files, ["tails.bin"]);
        assert_eq!(blocks[1].files, ["knuckles.bin"]);
        assert_eq!(blocks[2].files, ["disc1.bin", "disc2.bin"]);
        assert_eq!(blocks[2].metadata.title.as_deref(), Some("Sonic CD"));
        assert_eq!(blocks[2].metadata.developer.as_deref(), Some("Sega"));
    }

    #[test]
    fn missing_directory_is_a_diagnostic() -> Result<()> {
        let temp = tempdir()?;
        let provider = DirectoryProvider::new([temp.path().join("nope")]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;
        provider.enhance(&mut games, &mut collections, &mut diagnostics)?;

        assert!(games.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.iter().all(|d| d.source == DirectoryProvider::NAME));
        Ok(())
    }

    #[test]
    fn broken_collection_entries_are_reported() -> Result<()> {
        let temp = tempdir()?;
        fs::write(
            temp.path().join("collections.txt"),
            "extensions: nes\ncollection: nes\nregex: ([\nfoo: bar\nextensions: nes\n",
        )?;
        fs::write(temp.path().join("smb.nes"), b"rom")?;

        let provider = DirectoryProvider::new([temp.path()]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(collections.get("nes").map(|c| c.game_count()), Some(1));
        Ok(())
    }

    #[test]
    fn parses_rating_release_and_players() {
        assert_eq!(parse_rating("75%"), Some(0.75));
        assert_eq!(parse_rating("0.5"), Some(0.5));
        assert_eq!(parse_rating("150%"), None);
        assert_eq!(parse_release("1991"), NaiveDate::from_ymd_opt(1991, 1, 1));
        assert_eq!(parse_release("1991-08"), NaiveDate::from_ymd_opt(1991, 8, 1));
        assert_eq!(parse_release("1991-13-01"), None);
        assert_eq!(parse_players("1-4"), Some(4));
        assert_eq!(parse_players("0"), None);
    }
}
