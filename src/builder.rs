//! Campaign generation
//!
//! Entries are produced in a fixed loop order: ordered worker pairs, then
//! templates, then expanded parameter sets. IDs count up from 1 in that
//! order, so identical inputs always give identical campaigns.

use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};

use crate::campaign::{Campaign, CampaignEntry, WorkerAssignment};
use crate::expand::{ExpandError, ListSource, ParameterExpander, ParameterSet};
use crate::kind::TestKind;
use crate::profile::WorkerProfile;
use crate::template::TestTemplate;

/// Why a (pair, template) combination produced no entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    ResponderNotInternetAccessible,
    ResponderNotIntranetAccessible,
    MirroredDirection,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ResponderNotInternetAccessible => "Worker_2 not internet accessible",
            Self::ResponderNotIntranetAccessible => "Worker_2 not intranet accessible",
            Self::MirroredDirection => "mirrored direction of a single-direction test",
        };
        f.write_str(text)
    }
}

/// Inclusion rules for one (Worker_1, Worker_2, test) combination.
pub fn admit(
    kind: &TestKind,
    worker_1: &WorkerProfile,
    worker_2: &WorkerProfile,
) -> Result<(), SkipReason> {
    if !worker_2.is_internet_accessible() {
        return Err(SkipReason::ResponderNotInternetAccessible);
    }
    if kind.requires_intranet() && !worker_2.is_intranet_accessible() {
        return Err(SkipReason::ResponderNotIntranetAccessible);
    }
    if kind.single_direction() && worker_1.name > worker_2.name {
        return Err(SkipReason::MirroredDirection);
    }
    Ok(())
}

/// All ordered pairs of distinct profiles, Worker_1 outermost.
pub fn ordered_pairs(
    profiles: &[WorkerProfile],
) -> impl Iterator<Item = (&WorkerProfile, &WorkerProfile)> {
    profiles.iter().enumerate().flat_map(move |(i, first)| {
        profiles
            .iter()
            .enumerate()
            .filter(move |(j, _)| *j != i)
            .map(move |(_, second)| (first, second))
    })
}

/// Per-run statistics, reported after generation.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub pairs: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

pub struct CampaignBuilder<S> {
    expander: ParameterExpander<S>,
}

impl<S: ListSource> CampaignBuilder<S> {
    pub fn new(expander: ParameterExpander<S>) -> Self {
        Self { expander }
    }

    pub fn build(
        &self,
        profiles: &[WorkerProfile],
        templates: &[TestTemplate],
    ) -> Result<Campaign, ExpandError> {
        self.build_with_stats(profiles, templates)
            .map(|(campaign, _)| campaign)
    }

    pub fn build_with_stats(
        &self,
        profiles: &[WorkerProfile],
        templates: &[TestTemplate],
    ) -> Result<(Campaign, BuildStats), ExpandError> {
        let mut entries = Vec::new();
        let mut stats = BuildStats::default();
        let mut expanded: HashMap<usize, Vec<ParameterSet>> = HashMap::new();
        let mut next_id = 1u64;

        for (worker_1, worker_2) in ordered_pairs(profiles) {
            stats.pairs += 1;

            for (index, template) in templates.iter().enumerate() {
                let kind = template.kind();

                if let Err(reason) = admit(&kind, worker_1, worker_2) {
                    debug!(
                        "Skipping {} for {} -> {}: {}",
                        template.name, worker_1.name, worker_2.name, reason
                    );
                    *stats.skipped.entry(reason).or_default() += 1;
                    continue;
                }

                // Expansion does not depend on the pair, so each template is
                // expanded once, on first use.
                let sets = match expanded.entry(index) {
                    Entry::Occupied(cached) => cached.into_mut(),
                    Entry::Vacant(slot) => {
                        slot.insert(self.expander.expand(&template.parameters, &kind)?)
                    }
                };

                for set in sets {
                    let parameters = finalize_parameters(set.clone(), &kind, worker_2);
                    entries.push(CampaignEntry {
                        id: next_id,
                        name: template.name.clone(),
                        worker_1: WorkerAssignment::new(
                            worker_1,
                            &template.worker_1_role,
                            &template.worker_1_fields,
                        ),
                        worker_2: WorkerAssignment::new(
                            worker_2,
                            &template.worker_2_role,
                            &template.worker_2_fields,
                        ),
                        parameters,
                    });
                    next_id += 1;
                }
            }
        }

        info!(
            "Generated {} entries from {} worker pairs and {} templates",
            entries.len(),
            stats.pairs,
            templates.len()
        );
        Ok((Campaign::new(entries), stats))
    }
}

fn finalize_parameters(
    mut params: ParameterSet,
    kind: &TestKind,
    responder: &WorkerProfile,
) -> ParameterSet {
    if !kind.carries_own_addresses() {
        params.insert("ip".to_string(), Value::String(responder.ip.clone()));
    }
    if kind.injects_identifier() {
        let identifier = params
            .get("ip")
            .cloned()
            .unwrap_or_else(|| Value::String(responder.ip.clone()));
        params.insert("identifier".to_string(), identifier);
    }
    params
}
