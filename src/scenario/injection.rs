//! Injection ledger
//!
//! Every successful injection is recorded here so teardown can de-assert it.
//! A slot (target + key) appears once; injecting it again moves it to the
//! end with the new value. Release runs in reverse injection order and
//! empties the ledger, so each slot is released exactly once.

use crate::error::RigError;
use crate::rig::{ItemType, Rig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionTarget {
    /// Override flag is cleared with the type that accepted the write
    Gdt { channel: usize, item_type: ItemType },
    GdtStruct { channel: usize, structure: String },
    Sim { unit: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRecord {
    pub target: InjectionTarget,
    /// Data item, struct field or SIM label
    pub key: String,
    pub value: String,
}

impl InjectionRecord {
    fn same_slot(&self, other: &InjectionRecord) -> bool {
        if self.key != other.key {
            return false;
        }
        match (&self.target, &other.target) {
            (InjectionTarget::Gdt { channel: a, .. }, InjectionTarget::Gdt { channel: b, .. }) => a == b,
            (
                InjectionTarget::GdtStruct { channel: a, structure: s },
                InjectionTarget::GdtStruct { channel: b, structure: t },
            ) => a == b && s == t,
            (InjectionTarget::Sim { .. }, InjectionTarget::Sim { .. }) => true,
            _ => false,
        }
    }

    fn is_sim(&self) -> bool {
        matches!(self.target, InjectionTarget::Sim { .. })
    }
}

#[derive(Debug, Default)]
pub struct InjectionLedger {
    records: Vec<InjectionRecord>,
}

impl InjectionLedger {
    pub fn record(&mut self, target: InjectionTarget, key: impl Into<String>, value: impl Into<String>) {
        let record = InjectionRecord {
            target,
            key: key.into(),
            value: value.into(),
        };
        self.records.retain(|r| !r.same_slot(&record));
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InjectionRecord] {
        &self.records
    }

    /// Clear SIM injections, newest first
    pub fn release_sim(&mut self, rig: &mut Rig) -> Vec<RigError> {
        self.release(rig, true)
    }

    /// Clear GDT overrides and struct writes, newest first
    pub fn release_gdt(&mut self, rig: &mut Rig) -> Vec<RigError> {
        self.release(rig, false)
    }

    fn release(&mut self, rig: &mut Rig, sim: bool) -> Vec<RigError> {
        let (released, kept): (Vec<_>, Vec<_>) = self.records.drain(..).partition(|r| r.is_sim() == sim);
        self.records = kept;

        let mut errors = Vec::new();
        for record in released.into_iter().rev() {
            if let Err(e) = release_one(rig, &record) {
                errors.push(e);
            }
        }
        errors
    }
}

fn release_one(rig: &mut Rig, record: &InjectionRecord) -> Result<(), RigError> {
    match &record.target {
        InjectionTarget::Sim { unit } => {
            tracing::debug!("SIM: clearing {}", record.key);
            rig.sim.set_value(&record.key, unit, "")
        }
        InjectionTarget::Gdt { channel, item_type } => {
            rig.ensure_connected(*channel)?;
            rig.channel(*channel)?
                .set_override(*item_type, &record.key, false)
                .map(|_| ())
        }
        InjectionTarget::GdtStruct { channel, structure } => {
            rig.ensure_connected(*channel)?;
            rig.channel(*channel)?.release_struct_field(structure, &record.key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::bench::{BenchEvent, BenchRig};

    fn sim(unit: &str) -> InjectionTarget {
        InjectionTarget::Sim { unit: unit.to_string() }
    }

    #[test]
    fn test_reinjection_moves_to_end() {
        let mut ledger = InjectionLedger::default();
        ledger.record(sim("N/A"), "Airspeed", "250");
        ledger.record(InjectionTarget::Gdt { channel: 0, item_type: ItemType::Number }, "alt", "150");
        ledger.record(sim("N/A"), "Airspeed", "300");
        ledger.record(InjectionTarget::Gdt { channel: 1, item_type: ItemType::Number }, "alt", "1");

        let keys: Vec<_> = ledger.records().iter().map(|r| (r.key.as_str(), r.value.as_str())).collect();
        assert_eq!(keys, vec![("alt", "150"), ("Airspeed", "300"), ("alt", "1")]);
    }

    #[test]
    fn test_release_runs_in_reverse_and_empties() {
        let (mut rig, bench) = BenchRig::new(&["OFP_SR1"]).into_rig();
        bench.borrow_mut().declare(0, "alt", ItemType::Number, None);
        bench.borrow_mut().declare(0, "gear", ItemType::Flag, None);

        let mut ledger = InjectionLedger::default();
        ledger.record(InjectionTarget::Gdt { channel: 0, item_type: ItemType::Number }, "alt", "150");
        ledger.record(sim("[kts]"), "Airspeed", "250");
        ledger.record(InjectionTarget::Gdt { channel: 0, item_type: ItemType::Flag }, "gear", "1");
        ledger.record(
            InjectionTarget::GdtStruct { channel: 0, structure: "HUD".into() },
            "u8Mode",
            "3",
        );

        assert!(ledger.release_sim(&mut rig).is_empty());
        assert_eq!(ledger.len(), 3);
        assert!(ledger.release_gdt(&mut rig).is_empty());
        assert!(ledger.is_empty());
        assert!(ledger.release_gdt(&mut rig).is_empty());

        let state = bench.borrow();
        let released: Vec<_> = state
            .events
            .iter()
            .filter_map(|e| match e {
                BenchEvent::GdtOverride { item, enabled: false, .. } => Some(item.clone()),
                BenchEvent::StructRelease { field, .. } => Some(field.clone()),
                BenchEvent::SimValue { label, value, .. } if value.is_empty() => Some(label.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec!["Airspeed", "u8Mode", "gear", "alt"]);
    }

    #[test]
    fn test_release_collects_errors() {
        let (mut rig, _bench) = BenchRig::new(&["OFP_SR1"]).into_rig();
        let mut ledger = InjectionLedger::default();
        ledger.record(InjectionTarget::Gdt { channel: 0, item_type: ItemType::Number }, "ghost", "1");
        ledger.record(InjectionTarget::Gdt { channel: 3, item_type: ItemType::Number }, "alt", "1");
        assert_eq!(ledger.release_gdt(&mut rig).len(), 2);
        assert!(ledger.is_empty());
    }
}
