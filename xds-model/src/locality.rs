//! Locality priority mapper (C8): a deterministic function from a client's
//! zone and a set of endpoint zones to a compact, gap-free priority
//! assignment, used by the EDS builder (C4) to rank localities.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Matches `<region>-<letter-suffix>`, e.g. `us-west1-a` -> region `us-west1`.
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)-[A-Za-z]+$").unwrap());
/// Matches `<super-region><trailing-digits>`, e.g. `us-west1` -> `us-west`.
static SUPER_REGION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+?)\d+$").unwrap());

/// Rank of the match bucket a zone falls into relative to the client zone.
/// Lower is a closer match; these are *not* the final priorities (which
/// must be contiguous and gap-free), only the ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
	Zone,
	Region,
	SuperRegion,
	MultiRegion,
	Other,
}

fn region(zone: &str) -> Option<&str> {
	REGION_RE.captures(zone).map(|c| c.get(1).unwrap().as_str())
}

fn super_region(region: &str) -> Option<&str> {
	SUPER_REGION_RE.captures(region).map(|c| c.get(1).unwrap().as_str())
}

fn multi_region(super_region: &str) -> &str {
	super_region.split('-').next().unwrap_or(super_region)
}

fn bucket(client_zone: &str, zone: &str) -> Bucket {
	if client_zone.is_empty() {
		return Bucket::Other;
	}
	if zone == client_zone {
		return Bucket::Zone;
	}
	if let (Some(r), Some(cr)) = (region(zone), region(client_zone)) {
		if r == cr {
			return Bucket::Region;
		}
	}
	// super-region and multi-region are derived from the *region*, not the
	// raw zone; a zone whose region failed to parse has no super-region
	// either and falls straight through to Other.
	if let (Some(r), Some(cr)) = (region(zone), region(client_zone)) {
		if let (Some(s), Some(cs)) = (super_region(r), super_region(cr)) {
			if s == cs {
				return Bucket::SuperRegion;
			}
			if multi_region(s) == multi_region(cs) {
				return Bucket::MultiRegion;
			}
		}
	}
	Bucket::Other
}

pub struct LocalityPriorityMapper;

impl LocalityPriorityMapper {
	/// Assigns a priority to every distinct zone in `zones`. Priorities
	/// start at 0, are contiguous, and two zones get the same priority iff
	/// they fall in the same match bucket relative to `client_zone`.
	pub fn assign<'a>(
		client_zone: &str,
		zones: impl IntoIterator<Item = &'a str>,
	) -> BTreeMap<String, u32> {
		let mut bucket_of: BTreeMap<String, Bucket> = BTreeMap::new();
		for z in zones {
			bucket_of.entry(z.to_string()).or_insert_with(|| bucket(client_zone, z));
		}

		let mut distinct: Vec<Bucket> = bucket_of.values().copied().collect();
		distinct.sort_unstable();
		distinct.dedup();
		let rank: BTreeMap<Bucket, u32> =
			distinct.into_iter().enumerate().map(|(i, b)| (b, i as u32)).collect();

		bucket_of.into_iter().map(|(z, b)| (z, rank[&b])).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scenario_1_single_leaf() {
		let p = LocalityPriorityMapper::assign("us-west1-a", ["us-west1-a", "us-west1-b"]);
		assert_eq!(p["us-west1-a"], 0);
		assert_eq!(p["us-west1-b"], 1);
	}

	#[test]
	fn scenario_4_cross_region() {
		let p = LocalityPriorityMapper::assign(
			"us-west1-a",
			["us-west1-a", "us-west1-b", "us-west2-a", "us-east1-b", "europe-west1-a"],
		);
		assert_eq!(p["us-west1-a"], 0);
		assert_eq!(p["us-west1-b"], 1);
		assert_eq!(p["us-west2-a"], 2);
		assert_eq!(p["us-east1-b"], 3);
		assert_eq!(p["europe-west1-a"], 4);
	}

	#[test]
	fn empty_client_zone_collapses_to_single_priority() {
		let p = LocalityPriorityMapper::assign("", ["us-west1-a", "europe-west1-a"]);
		assert_eq!(p["us-west1-a"], 0);
		assert_eq!(p["europe-west1-a"], 0);
	}

	#[test]
	fn priorities_have_no_gaps() {
		let p = LocalityPriorityMapper::assign("us-west1-a", ["us-west1-a", "europe-west1-a"]);
		let mut values: Vec<u32> = p.values().copied().collect();
		values.sort_unstable();
		values.dedup();
		assert_eq!(values, vec![0, 1]);
	}
}
