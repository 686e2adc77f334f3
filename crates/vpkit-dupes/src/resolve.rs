//! Override, shadow and identical-content resolution.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};
use vpkit_vp::VpArchive;

use crate::findings::{Finding, Holder, Identical, Override, Shadow};
use crate::index::{discover, LoadIndex, Occurrence};
use crate::Result;

/// How duplicates are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Report overrides and shadows by load order.
    #[default]
    LoadOrder,
    /// Report byte-identical files, confirmed by CRC32.
    Checksum,
}

/// Options for [`find_duplicates`].
#[derive(Debug, Clone, Default)]
pub struct DupesOptions {
    pub mode: MatchMode,
    /// Container names whose duplicates among themselves are not reported.
    pub exclude: HashSet<String>,
}

/// Scan every `.vp` in `search_dirs` as one load list and report duplicates.
pub fn find_duplicates<P: AsRef<Path>>(
    search_dirs: &[P],
    options: &DupesOptions,
) -> Result<Vec<Finding>> {
    let containers = discover(search_dirs)?;
    info!(archives = containers.len(), "load list");

    let index = LoadIndex::build(containers)?;
    match options.mode {
        MatchMode::LoadOrder => Ok(resolve_load_order(&index, &options.exclude)),
        MatchMode::Checksum => resolve_checksums(&index, &options.exclude),
    }
}

/// Occurrences of one key split by exact logical path, first-seen order.
fn group_by_path(occurrences: &[Occurrence]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for occurrence in occurrences {
        let path = occurrence.entry.path();
        let slot = match groups.iter().position(|(p, _)| *p == path) {
            Some(slot) => slot,
            None => {
                groups.push((path, Vec::new()));
                groups.len() - 1
            }
        };
        let containers = &mut groups[slot].1;
        if !containers.contains(&occurrence.container) {
            containers.push(occurrence.container);
        }
    }
    groups
}

/// Load-order resolution.
///
/// Within each candidate key, the path of the first occurrence wins. Other
/// containers at that same path are overridden by it; every other path is
/// shadowed. Findings come out in the order their paths were first seen.
pub fn resolve_load_order(index: &LoadIndex, exclude: &HashSet<String>) -> Vec<Finding> {
    let names = |containers: &[usize]| -> Vec<String> {
        containers
            .iter()
            .map(|&c| index.container_name(c).to_string())
            .collect()
    };

    let mut findings: Vec<(usize, Finding)> = Vec::new();
    for (key, occurrences) in index.candidates(exclude) {
        let groups = group_by_path(occurrences);
        let (priority_path, priority_holders) = &groups[0];
        let priority = index.container_name(priority_holders[0]).to_string();
        debug!(key = ?key, paths = groups.len(), "candidate");

        if priority_holders.len() > 1 {
            findings.push((
                index.first_seen(priority_path),
                Finding::Override(Override {
                    priority: priority.clone(),
                    path: priority_path.to_string(),
                    overridden: names(&priority_holders[1..]),
                }),
            ));
        }

        for (path, holders) in &groups[1..] {
            findings.push((
                index.first_seen(path),
                Finding::Shadow(Shadow {
                    priority: priority.clone(),
                    priority_path: priority_path.to_string(),
                    path: path.to_string(),
                    containers: names(holders),
                }),
            ));
        }
    }

    findings.sort_by_key(|(seen, _)| *seen);
    findings.into_iter().map(|(_, finding)| finding).collect()
}

/// Checksum resolution.
///
/// Candidate keys are narrowed to occurrences sharing an exact size, those
/// are hashed, and any file name + CRC32 pair held more than once is
/// reported as identical.
pub fn resolve_checksums(index: &LoadIndex, exclude: &HashSet<String>) -> Result<Vec<Finding>> {
    let mut to_hash: Vec<&Occurrence> = Vec::new();
    for (_, occurrences) in index.candidates(exclude) {
        let mut by_size: Vec<(u32, Vec<&Occurrence>)> = Vec::new();
        for occurrence in occurrences {
            let size = occurrence.entry.size();
            match by_size.iter_mut().find(|(s, _)| *s == size) {
                Some((_, group)) => group.push(occurrence),
                None => by_size.push((size, vec![occurrence])),
            }
        }
        to_hash.extend(
            by_size
                .into_iter()
                .filter(|(_, group)| group.len() > 1)
                .flat_map(|(_, group)| group),
        );
    }

    let crcs = checksum_all(index, &to_hash)?;

    let mut groups: Vec<((&str, u32), Vec<&Occurrence>)> = Vec::new();
    let mut lookup: HashMap<(&str, u32), usize> = HashMap::new();
    for (occurrence, crc) in to_hash.iter().copied().zip(crcs) {
        let key = (occurrence.entry.name(), crc);
        match lookup.get(&key) {
            Some(&slot) => groups[slot].1.push(occurrence),
            None => {
                lookup.insert(key, groups.len());
                groups.push((key, vec![occurrence]));
            }
        }
    }

    Ok(groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(_, members)| {
            let path = members[0].entry.path().to_string();
            let holders = members
                .iter()
                .map(|m| Holder {
                    container: index.container_name(m.container).to_string(),
                    path: (m.entry.path() != path).then(|| m.entry.path().to_string()),
                })
                .collect();
            Finding::Identical(Identical { path, holders })
        })
        .collect())
}

/// CRC32 of each occurrence, in the order given.
///
/// Each archive is opened once.
fn checksum_all(index: &LoadIndex, occurrences: &[&Occurrence]) -> Result<Vec<u32>> {
    let mut crcs = vec![0u32; occurrences.len()];

    let mut by_container: Vec<(usize, Vec<usize>)> = Vec::new();
    for (i, occurrence) in occurrences.iter().enumerate() {
        match by_container
            .iter_mut()
            .find(|(c, _)| *c == occurrence.container)
        {
            Some((_, members)) => members.push(i),
            None => by_container.push((occurrence.container, vec![i])),
        }
    }

    for (container, members) in by_container {
        let mut archive = VpArchive::open(&index.containers()[container].path)?;
        for i in members {
            crcs[i] = archive.crc32(&occurrences[i].entry)?;
        }
        debug!(archive = archive.name(), "checksummed");
    }

    Ok(crcs)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::testutil::make_vp;

    fn lines(findings: &[Finding]) -> Vec<String> {
        findings.iter().map(|f| f.to_string()).collect()
    }

    /// vp0..vp3, each overriding its predecessor's last file.
    fn chain(root: &Path) -> PathBuf {
        let vps = root.join("vps");
        make_vp(root, &vps, "vp0.vp", &[("a.txt", "a0")]);
        make_vp(root, &vps, "vp1.vp", &[("a.txt", "a1"), ("b.txt", "b1")]);
        make_vp(root, &vps, "vp2.vp", &[("b.txt", "b2"), ("c.txt", "c2")]);
        make_vp(root, &vps, "vp3.vp", &[("c.txt", "c3")]);
        vps
    }

    fn exclude(names: &[&str]) -> DupesOptions {
        DupesOptions {
            mode: MatchMode::LoadOrder,
            exclude: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_override_chain() {
        let dir = tempfile::tempdir().unwrap();
        let vps = chain(dir.path());

        let findings = find_duplicates(&[&vps], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec![
                "override vp0.vp::data/a.txt::vp1.vp",
                "override vp1.vp::data/b.txt::vp2.vp",
                "override vp2.vp::data/c.txt::vp3.vp",
            ]
        );
    }

    #[test]
    fn test_exclusion_needs_every_holder() {
        let dir = tempfile::tempdir().unwrap();
        let vps = chain(dir.path());

        let findings = find_duplicates(&[&vps], &exclude(&["vp1.vp"])).unwrap();
        assert_eq!(findings.len(), 3);

        let findings = find_duplicates(&[&vps], &exclude(&["vp1.vp", "vp2.vp"])).unwrap();
        assert_eq!(
            lines(&findings),
            vec![
                "override vp0.vp::data/a.txt::vp1.vp",
                "override vp2.vp::data/c.txt::vp3.vp",
            ]
        );
    }

    #[test]
    fn test_shadows() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("maps/a.dds", "0")]);
        make_vp(
            dir.path(),
            &vps,
            "vp1.vp",
            &[("maps/a.dds", "1"), ("maps/hi/a.dds", "1")],
        );
        make_vp(dir.path(), &vps, "vp2.vp", &[("maps/hi/A.dds", "2")]);

        let findings = find_duplicates(&[&vps], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec![
                "override vp0.vp::data/maps/a.dds::vp1.vp",
                "shadow vp0.vp::data/maps/a.dds::data/maps/hi/a.dds::vp1.vp:vp2.vp",
            ]
        );
    }

    #[test]
    fn test_shadow_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("voice/briefing/x/b.wav", "0")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("voice/briefing/b.wav", "1")]);
        // Different path type, not a duplicate.
        make_vp(dir.path(), &vps, "vp2.vp", &[("voice/b.wav", "2")]);

        let findings = find_duplicates(&[&vps], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec!["shadow vp0.vp::data/voice/briefing/x/b.wav::data/voice/briefing/b.wav::vp1.vp"]
        );
    }

    #[test]
    fn test_findings_follow_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("tables/z.tbl", "z")]);
        make_vp(
            dir.path(),
            &vps,
            "vp1.vp",
            &[("maps/a.dds", "a"), ("tables/z.tbl", "z")],
        );
        make_vp(dir.path(), &vps, "vp2.vp", &[("maps/a.dds", "a")]);

        let findings = find_duplicates(&[&vps], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec![
                "override vp0.vp::data/tables/z.tbl::vp1.vp",
                "override vp1.vp::data/maps/a.dds::vp2.vp",
            ]
        );
    }

    #[test]
    fn test_search_dirs_in_given_order() {
        let dir = tempfile::tempdir().unwrap();
        let mods = dir.path().join("mod");
        let base = dir.path().join("base");
        make_vp(dir.path(), &mods, "z_mod.vp", &[("a.txt", "mod")]);
        make_vp(dir.path(), &base, "a_base.vp", &[("a.txt", "base")]);

        let findings = find_duplicates(&[&mods, &base], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec!["override z_mod.vp::data/a.txt::a_base.vp"]
        );
    }

    #[test]
    fn test_checksum_mode() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("maps/a.dds", "AAAA"), ("maps/b.dds", "b")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("maps/hi/a.dds", "AAAA")]);
        // Same size, different content.
        make_vp(dir.path(), &vps, "vp2.vp", &[("maps/a.dds", "BBBB")]);
        // Different size, never hashed.
        make_vp(dir.path(), &vps, "vp3.vp", &[("maps/b.dds", "bbbbbb")]);

        let options = DupesOptions {
            mode: MatchMode::Checksum,
            ..Default::default()
        };
        let findings = find_duplicates(&[&vps], &options).unwrap();
        assert_eq!(
            lines(&findings),
            vec!["identical data/maps/a.dds::vp0.vp vp1.vp:data/maps/hi/a.dds"]
        );
    }

    #[test]
    fn test_checksum_mode_respects_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("maps/a.dds", "AAAA")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("maps/a.dds", "AAAA")]);

        let options = DupesOptions {
            mode: MatchMode::Checksum,
            exclude: ["vp0.vp", "vp1.vp"].iter().map(|n| n.to_string()).collect(),
        };
        assert!(find_duplicates(&[&vps], &options).unwrap().is_empty());
    }

    #[test]
    fn test_override_lists_every_later_container() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("a.txt", "a0")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("A.TXT", "a1")]);
        make_vp(dir.path(), &vps, "vp2.vp", &[("a.txt", "a2")]);

        let findings = find_duplicates(&[&vps], &DupesOptions::default()).unwrap();
        assert_eq!(
            lines(&findings),
            vec!["override vp0.vp::data/a.txt::vp1.vp:vp2.vp"]
        );
    }

    #[test]
    fn test_checksum_groups_across_path_types() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(
            dir.path(),
            &vps,
            "vp0.vp",
            &[("effects/a.dds", "AAAA"), ("maps/a.dds", "AAAA")],
        );
        make_vp(
            dir.path(),
            &vps,
            "vp1.vp",
            &[("effects/a.dds", "AAAA"), ("maps/a.dds", "AAAA")],
        );

        let options = DupesOptions {
            mode: MatchMode::Checksum,
            ..Default::default()
        };
        let findings = find_duplicates(&[&vps], &options).unwrap();
        assert_eq!(
            lines(&findings),
            vec![
                "identical data/effects/a.dds::vp0.vp vp1.vp \
                 vp0.vp:data/maps/a.dds vp1.vp:data/maps/a.dds"
            ]
        );
    }

    #[test]
    fn test_checksum_partial_exclusion_keeps_group() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("maps/a.dds", "AAAA")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("maps/a.dds", "AAAA")]);
        make_vp(dir.path(), &vps, "vp2.vp", &[("maps/a.dds", "AAAA")]);

        let options = DupesOptions {
            mode: MatchMode::Checksum,
            exclude: ["vp0.vp", "vp1.vp"].iter().map(|n| n.to_string()).collect(),
        };
        let findings = find_duplicates(&[&vps], &options).unwrap();
        assert_eq!(
            lines(&findings),
            vec!["identical data/maps/a.dds::vp0.vp vp1.vp vp2.vp"]
        );
    }

    #[test]
    fn test_no_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let vps = dir.path().join("vps");
        make_vp(dir.path(), &vps, "vp0.vp", &[("a.txt", "a")]);
        make_vp(dir.path(), &vps, "vp1.vp", &[("b.txt", "b")]);

        assert!(find_duplicates(&[&vps], &DupesOptions::default())
            .unwrap()
            .is_empty());
    }
}
