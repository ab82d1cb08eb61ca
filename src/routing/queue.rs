//! Deviation bookkeeping for the borrow/lend algorithms: ordered deviation
//! lists, zone priority queues, and the endpoint assignment helper.
//!
//! The queues order *live* zone state: a zone's priority changes whenever
//! endpoints move, so the contract is pop, mutate, push back while still
//! valid. Heap operations take the region and the slice-group map as
//! arguments and re-evaluate priorities on every comparison. The sift
//! rules mirror Go's `container/heap`, which pins the pop order for equal
//! priorities.

use crate::topology::{RegionInfo, SliceGroups, WeightedEndpoints};
use std::collections::VecDeque;

/// Deviation between the expected and actual number of endpoints of a
/// zone, as carried through the available/needed lists.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDeviation {
    /// Zone name.
    pub name: String,
    /// Whole endpoints of deviation.
    pub deviation: i64,
    /// Fractional deviation, expressed as a routing weight.
    pub weight: f64,
    /// Whether the fractional endpoint serves its home zone first
    /// (local-weighted algorithm only).
    pub consume_by_local: bool,
}

impl EndpointDeviation {
    pub fn new(name: impl Into<String>, deviation: i64) -> Self {
        Self {
            name: name.into(),
            deviation,
            weight: 0.0,
            consume_by_local: false,
        }
    }

    pub fn with_weight(name: impl Into<String>, deviation: i64, weight: f64) -> Self {
        Self {
            name: name.into(),
            deviation,
            weight,
            consume_by_local: false,
        }
    }
}

/// FIFO list of endpoint deviations with front access.
#[derive(Debug, Default)]
pub struct EndpointsList {
    by_zone: VecDeque<EndpointDeviation>,
}

impl EndpointsList {
    pub fn push_back(&mut self, value: EndpointDeviation) {
        self.by_zone.push_back(value);
    }

    pub fn push_front(&mut self, value: EndpointDeviation) {
        self.by_zone.push_front(value);
    }

    pub fn pop_front(&mut self) -> Option<EndpointDeviation> {
        self.by_zone.pop_front()
    }

    pub fn front(&self) -> Option<&EndpointDeviation> {
        self.by_zone.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut EndpointDeviation> {
        self.by_zone.front_mut()
    }

    pub fn len(&self) -> usize {
        self.by_zone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_zone.is_empty()
    }
}

/// How a [`ZonePriorityQueue`] ranks zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrdering {
    /// Rank by traffic load of the zone's local slice group. Contributors
    /// are ranked by the load they would have after giving one endpoint
    /// out (smallest first); receivers by their current load (largest
    /// first, zero-endpoint groups count as infinite).
    TrafficLoad,
    /// Rank by signed endpoints deviation `|sg| / total − nodes_ratio`
    /// (largest surplus first for contributors, reversed for receivers).
    SignedDeviation,
}

/// Binary heap over zone names whose priorities are derived from the
/// current slice-group state.
#[derive(Debug)]
pub struct ZonePriorityQueue {
    zone_names: Vec<String>,
    ordering: QueueOrdering,
    /// true ranks zones as receivers, false as contributors.
    receive_endpoint: bool,
}

impl ZonePriorityQueue {
    pub fn new(ordering: QueueOrdering, receive_endpoint: bool) -> Self {
        Self {
            zone_names: Vec::new(),
            ordering,
            receive_endpoint,
        }
    }

    /// Append without restoring heap order; callers run [`Self::init`]
    /// once enrolment is complete.
    pub fn enroll(&mut self, zone: impl Into<String>) {
        self.zone_names.push(zone.into());
    }

    pub fn len(&self) -> usize {
        self.zone_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zone_names.is_empty()
    }

    /// The best-ranked zone, if any. Only meaningful after [`Self::init`].
    pub fn peek(&self) -> Option<&str> {
        self.zone_names.first().map(|s| s.as_str())
    }

    /// Establish heap order over the enrolled zones.
    pub fn init(&mut self, region: &RegionInfo, slice_groups: &SliceGroups) {
        let n = self.zone_names.len();
        for i in (0..n / 2).rev() {
            self.down(i, n, region, slice_groups);
        }
    }

    /// Push a zone and restore heap order.
    pub fn push(&mut self, zone: impl Into<String>, region: &RegionInfo, slice_groups: &SliceGroups) {
        self.zone_names.push(zone.into());
        self.up(self.zone_names.len() - 1, region, slice_groups);
    }

    /// Pop the best-ranked zone.
    pub fn pop(&mut self, region: &RegionInfo, slice_groups: &SliceGroups) -> Option<String> {
        if self.zone_names.is_empty() {
            return None;
        }
        let n = self.zone_names.len() - 1;
        self.zone_names.swap(0, n);
        self.down(0, n, region, slice_groups);
        self.zone_names.pop()
    }

    fn up(&mut self, mut j: usize, region: &RegionInfo, slice_groups: &SliceGroups) {
        while j > 0 {
            let parent = (j - 1) / 2;
            if !self.less(j, parent, region, slice_groups) {
                break;
            }
            self.zone_names.swap(j, parent);
            j = parent;
        }
    }

    fn down(&mut self, i0: usize, n: usize, region: &RegionInfo, slice_groups: &SliceGroups) {
        let mut i = i0;
        loop {
            let j1 = 2 * i + 1;
            if j1 >= n {
                break;
            }
            let mut j = j1;
            let j2 = j1 + 1;
            if j2 < n && self.less(j2, j1, region, slice_groups) {
                j = j2;
            }
            if !self.less(j, i, region, slice_groups) {
                break;
            }
            self.zone_names.swap(i, j);
            i = j;
        }
    }

    fn less(&self, i: usize, j: usize, region: &RegionInfo, slice_groups: &SliceGroups) -> bool {
        let a = &self.zone_names[i];
        let b = &self.zone_names[j];
        match self.ordering {
            QueueOrdering::TrafficLoad => {
                if self.receive_endpoint {
                    self.load_now(a, region, slice_groups) > self.load_now(b, region, slice_groups)
                } else {
                    self.load_less_after_give(a, b, region, slice_groups)
                }
            }
            QueueOrdering::SignedDeviation => {
                if self.receive_endpoint {
                    self.signed_less(b, a, region, slice_groups)
                } else {
                    self.signed_less(a, b, region, slice_groups)
                }
            }
        }
    }

    /// Contributor ranking: the zone whose traffic load deviation after
    /// yielding one endpoint is smallest goes first. Zones with an empty
    /// local group always rank last.
    fn load_less_after_give(
        &self,
        a: &str,
        b: &str,
        region: &RegionInfo,
        slice_groups: &SliceGroups,
    ) -> bool {
        let a_size = group_size(slice_groups, a);
        let b_size = group_size(slice_groups, b);
        if a_size == 0 {
            return false;
        }
        if b_size == 0 {
            return true;
        }
        load_at(region, a, a_size - 1) < load_at(region, b, b_size - 1)
    }

    /// Receiver ranking input: current traffic load, infinite when the
    /// zone's group holds no endpoints.
    fn load_now(&self, zone: &str, region: &RegionInfo, slice_groups: &SliceGroups) -> f64 {
        load_at(region, zone, group_size(slice_groups, zone))
    }

    fn signed_less(&self, a: &str, b: &str, region: &RegionInfo, slice_groups: &SliceGroups) -> bool {
        if own_composition(slice_groups, a).number == 0 {
            return false;
        }
        if own_composition(slice_groups, b).number == 0 {
            return true;
        }
        signed_deviation(region, slice_groups, a) > signed_deviation(region, slice_groups, b)
    }
}

fn group_size(slice_groups: &SliceGroups, zone: &str) -> i64 {
    slice_groups
        .get(zone)
        .map(|sg| sg.number_of_endpoints())
        .unwrap_or(0)
}

fn own_composition(slice_groups: &SliceGroups, zone: &str) -> WeightedEndpoints {
    slice_groups
        .get(zone)
        .map(|sg| sg.composition_of(zone))
        .unwrap_or(WeightedEndpoints {
            number: 0,
            weight: 0.0,
        })
}

fn load_at(region: &RegionInfo, zone: &str, size: i64) -> f64 {
    if size <= 0 {
        return f64::INFINITY;
    }
    region.expected_endpoints(zone) / size as f64
}

fn signed_deviation(region: &RegionInfo, slice_groups: &SliceGroups, zone: &str) -> f64 {
    let ratio = region.zones.get(zone).map(|z| z.nodes_ratio).unwrap_or(0.0);
    group_size(slice_groups, zone) as f64 / region.total_endpoints as f64 - ratio
}

/// Deviation of a zone's slice group from its expected endpoints, `None`
/// when the zone has no slice group.
pub fn endpoints_deviation(
    region: &RegionInfo,
    slice_groups: &SliceGroups,
    zone: &str,
) -> Option<f64> {
    let sg = slice_groups.get(zone)?;
    Some(sg.number_of_endpoints() as f64 - region.expected_endpoints(zone))
}

/// Drain whole endpoints from the front of `available` into the slice
/// group of `receiver` until the receiver's deficit reaches zero or the
/// list runs dry. Transferred blocks always carry weight 1.
pub fn assign_endpoints(
    receiver: &mut EndpointDeviation,
    available: &mut EndpointsList,
    slice_groups: &mut SliceGroups,
) {
    while let Some(sender) = available.front_mut() {
        let granted = sender.deviation.min(receiver.deviation);
        if let Some(sg) = slice_groups.get_mut(&receiver.name) {
            sg.add_endpoints(&sender.name, granted, 1.0);
        }
        if sender.deviation == receiver.deviation {
            receiver.deviation = 0;
            available.pop_front();
            break;
        }
        if sender.deviation > receiver.deviation {
            sender.deviation -= receiver.deviation;
            receiver.deviation = 0;
            break;
        }
        receiver.deviation -= sender.deviation;
        available.pop_front();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{EndpointSliceGroup, Zone};

    fn region_and_groups(zones: &[(&str, i64, i64)]) -> (RegionInfo, SliceGroups) {
        let region = RegionInfo::from_zones(
            zones
                .iter()
                .map(|(name, nodes, endpoints)| Zone::new(*name, *nodes, *endpoints))
                .collect(),
        )
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));
        let mut slice_groups = SliceGroups::new();
        for (name, _, endpoints) in zones {
            let mut group = EndpointSliceGroup::local_to(name);
            if *endpoints > 0 {
                group.add_endpoints(name, *endpoints, 1.0);
            }
            slice_groups.insert(name.to_string(), group);
        }
        (region, slice_groups)
    }

    // -- contributor ordering ------------------------------------------

    #[test]
    fn test_contributor_pops_lowest_load_after_give() {
        // b would sit at load 9/19, c at 31.5/19 after giving one out.
        let (region, groups) = region_and_groups(&[("a", 1, 5), ("b", 2, 20), ("c", 7, 20)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, false);
        for zone in ["a", "b", "c"] {
            pq.enroll(zone);
        }
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("b"));
    }

    #[test]
    fn test_contributor_empty_group_ranks_last() {
        let (region, mut groups) = region_and_groups(&[("a", 1, 3), ("b", 1, 0)]);
        if let Some(sg) = groups.get_mut("b") {
            sg.composition.clear();
        }
        let mut pq = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, false);
        pq.enroll("b");
        pq.enroll("a");
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("a"));
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("b"));
    }

    // -- receiver ordering ---------------------------------------------

    #[test]
    fn test_receiver_pops_most_needy_first() {
        let (region, groups) = region_and_groups(&[("a", 1, 5), ("b", 5, 5), ("c", 2, 5)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, true);
        for zone in ["a", "b", "c"] {
            pq.enroll(zone);
        }
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("b"));
    }

    #[test]
    fn test_receiver_zero_endpoints_is_infinitely_needy() {
        let (region, groups) = region_and_groups(&[("a", 1, 9), ("b", 1, 0)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, true);
        pq.enroll("a");
        pq.enroll("b");
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("b"));
    }

    // -- signed-deviation ordering -------------------------------------

    #[test]
    fn test_signed_contributor_pops_largest_surplus() {
        // surplus: a +0.5, b +11, c -11.5 (expected 4.5 / 9 / 31.5)
        let (region, groups) = region_and_groups(&[("a", 1, 5), ("b", 2, 20), ("c", 7, 20)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::SignedDeviation, false);
        for zone in ["a", "b", "c"] {
            pq.enroll(zone);
        }
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("b"));
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("a"));
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("c"));
    }

    #[test]
    fn test_signed_receiver_pops_largest_deficit() {
        let (region, groups) = region_and_groups(&[("a", 1, 5), ("b", 2, 20), ("c", 7, 20)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::SignedDeviation, true);
        for zone in ["a", "b", "c"] {
            pq.enroll(zone);
        }
        pq.init(&region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("c"));
    }

    // -- push back while valid -----------------------------------------

    #[test]
    fn test_pop_mutate_push_reorders() {
        let (region, mut groups) = region_and_groups(&[("a", 1, 10), ("b", 1, 12)]);
        let mut pq = ZonePriorityQueue::new(QueueOrdering::SignedDeviation, false);
        pq.enroll("a");
        pq.enroll("b");
        pq.init(&region, &groups);

        // b has the larger surplus; after it gives 4 endpoints away the
        // balance flips and a pops first.
        let first = pq.pop(&region, &groups);
        assert_eq!(first.as_deref(), Some("b"));
        if let Some(sg) = groups.get_mut("b") {
            sg.add_endpoints("b", -4, 1.0);
        }
        pq.push("b", &region, &groups);
        assert_eq!(pq.pop(&region, &groups).as_deref(), Some("a"));
    }

    // -- assign_endpoints ----------------------------------------------

    fn deviation_list(entries: &[(&str, i64)]) -> EndpointsList {
        let mut list = EndpointsList::default();
        for (name, deviation) in entries {
            list.push_back(EndpointDeviation::new(*name, *deviation));
        }
        list
    }

    #[test]
    fn test_assign_exact_match_consumes_sender() {
        let (_, mut groups) = region_and_groups(&[("a", 1, 0), ("b", 1, 5)]);
        let mut receiver = EndpointDeviation::new("a", 3);
        let mut available = deviation_list(&[("b", 3)]);
        assign_endpoints(&mut receiver, &mut available, &mut groups);
        assert_eq!(receiver.deviation, 0);
        assert!(available.is_empty());
        assert_eq!(groups["a"].composition_of("b").number, 3);
    }

    #[test]
    fn test_assign_sender_surplus_stays_in_list() {
        let (_, mut groups) = region_and_groups(&[("a", 1, 0), ("b", 1, 9)]);
        let mut receiver = EndpointDeviation::new("a", 2);
        let mut available = deviation_list(&[("b", 5)]);
        assign_endpoints(&mut receiver, &mut available, &mut groups);
        assert_eq!(receiver.deviation, 0);
        assert_eq!(available.front().map(|e| e.deviation), Some(3));
        assert_eq!(groups["a"].composition_of("b").number, 2);
    }

    #[test]
    fn test_assign_drains_multiple_senders() {
        let (_, mut groups) = region_and_groups(&[("a", 1, 0), ("b", 1, 2), ("c", 1, 9)]);
        let mut receiver = EndpointDeviation::new("a", 5);
        let mut available = deviation_list(&[("b", 2), ("c", 4)]);
        assign_endpoints(&mut receiver, &mut available, &mut groups);
        assert_eq!(receiver.deviation, 0);
        assert_eq!(groups["a"].composition_of("b").number, 2);
        assert_eq!(groups["a"].composition_of("c").number, 3);
        assert_eq!(available.front().map(|e| e.deviation), Some(1));
    }

    #[test]
    fn test_assign_stops_when_list_runs_dry() {
        let (_, mut groups) = region_and_groups(&[("a", 1, 0), ("b", 1, 2)]);
        let mut receiver = EndpointDeviation::new("a", 5);
        let mut available = deviation_list(&[("b", 2)]);
        assign_endpoints(&mut receiver, &mut available, &mut groups);
        assert_eq!(receiver.deviation, 3);
        assert!(available.is_empty());
    }
}
