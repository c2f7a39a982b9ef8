//! Scan reconciliation workflow.
//!
//! Consumes one [`ScanResult`] and drives it to a committed delivery row:
//! look the code up in the store, pre-fill an editable form from the match,
//! and submit an update on confirmation. A code with no matching row (or a
//! failed lookup) terminates in "handle manually"; this branch never
//! creates a row implicitly; fresh registrations go through [`register`],
//! a distinct entry point that skips the lookup entirely.
//!
//! The captured still stays owned by the workflow until the submission
//! succeeds or the session is explicitly abandoned; it is never dropped
//! silently.
//!
//! [`register`]: DeliveryWorkflow::register

use anyhow::{anyhow, Context, Result};

use crate::store::{DeliveryRecord, DeliveryStoreClient, DeliveryUpdate, Lookup, NewDelivery};
use crate::{split_unit, unit_number, Block, Disposition, ScanResult, SessionState};

/// Editable block/floor/slot triple backing the confirmation step.
///
/// Fields are freely editable; ranges are validated at construction and
/// again when the unit number is encoded for submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryForm {
    pub block: Block,
    pub floor: u8,
    pub slot: u8,
}

impl DeliveryForm {
    pub fn new(block: Block, floor: u8, slot: u8) -> Result<Self> {
        unit_number(floor, slot)?;
        Ok(Self { block, floor, slot })
    }

    /// The store's unit encoding for this form's floor/slot.
    pub fn unit(&self) -> Result<u32> {
        unit_number(self.floor, self.slot)
    }

    /// Pre-fill from a fetched record by splitting its stored unit number.
    fn from_record(record: &DeliveryRecord) -> Result<Self> {
        let (floor, slot) = split_unit(record.number)
            .with_context(|| format!("delivery row for '{}' is malformed", record.reader_code))?;
        Ok(Self {
            block: record.block,
            floor,
            slot,
        })
    }
}

/// One scan's journey from lookup to committed row.
pub struct DeliveryWorkflow {
    client: DeliveryStoreClient,
    apartment_id: i64,
    state: SessionState,
    scan: Option<ScanResult>,
    record: Option<DeliveryRecord>,
    form: Option<DeliveryForm>,
}

impl DeliveryWorkflow {
    pub fn new(client: DeliveryStoreClient, apartment_id: i64) -> Self {
        Self {
            client,
            apartment_id,
            state: SessionState::Idle,
            scan: None,
            record: None,
            form: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn scanned_code(&self) -> Option<&str> {
        self.scan.as_ref().map(|scan| scan.code.as_str())
    }

    /// The still captured with the scan, held until submission or abandon.
    pub fn captured_image(&self) -> Option<&[u8]> {
        self.scan.as_ref().map(|scan| scan.image_png.as_slice())
    }

    pub fn record(&self) -> Option<&DeliveryRecord> {
        self.record.as_ref()
    }

    pub fn form(&self) -> Option<&DeliveryForm> {
        self.form.as_ref()
    }

    /// The editable form, present once a lookup resolved to a match.
    pub fn form_mut(&mut self) -> Option<&mut DeliveryForm> {
        self.form.as_mut()
    }

    /// Reconcile a scan against the store.
    ///
    /// A lookup failure takes the same terminal branch as a miss (the
    /// operator handles the package manually either way) but is logged
    /// distinctly. A matching row whose unit number cannot be split back
    /// into floor/slot fails instead of pre-filling garbage.
    pub fn resolve(&mut self, scan: ScanResult) -> Result<Disposition> {
        if self.state != SessionState::Idle {
            return Err(anyhow!("workflow already consumed a scan"));
        }
        self.state = SessionState::LookingUp;
        log::info!("looking up delivery for code '{}'", scan.code);
        let lookup = self.client.find_by_reader_code(&scan.code);
        self.scan = Some(scan);

        match lookup {
            Ok(Lookup::Found(record)) => {
                let form = DeliveryForm::from_record(&record)?;
                log::info!(
                    "delivery matched: id={:?} block={} unit={}",
                    record.id,
                    record.block,
                    record.number
                );
                self.record = Some(record);
                self.form = Some(form);
                self.state = SessionState::Resolved(Disposition::Found);
                Ok(Disposition::Found)
            }
            Ok(Lookup::NotFound) => {
                log::info!("no delivery matches the scanned code; handle manually");
                self.state = SessionState::Resolved(Disposition::NotFound);
                Ok(Disposition::NotFound)
            }
            Err(err) => {
                log::warn!("delivery lookup failed, treating as not found: {:#}", err);
                self.state = SessionState::Resolved(Disposition::NotFound);
                Ok(Disposition::NotFound)
            }
        }
    }

    /// Submit the confirmed edit as an update, marking the row delivered.
    ///
    /// Only valid once resolved to a match. On failure the form and the
    /// captured still stay intact so the operator can retry without
    /// re-scanning.
    pub fn confirm(&mut self) -> Result<DeliveryRecord> {
        if self.state != SessionState::Resolved(Disposition::Found) {
            return Err(anyhow!("nothing resolved to confirm"));
        }
        let scan = self
            .scan
            .as_ref()
            .ok_or_else(|| anyhow!("resolved workflow lost its scan"))?;
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| anyhow!("resolved workflow lost its record"))?;
        let form = self
            .form
            .ok_or_else(|| anyhow!("resolved workflow lost its form"))?;
        let id = record
            .id
            .ok_or_else(|| anyhow!("matched delivery row has no id; update it manually"))?;
        let number = form.unit()?;

        self.state = SessionState::Submitting;
        let update = DeliveryUpdate {
            reader_code: &scan.code,
            block: form.block,
            number,
            apartment_id: self.apartment_id,
            status: true,
            id,
        };
        match self.client.update(id, &update) {
            Ok(updated) => {
                log::info!("delivery {} marked delivered (unit {})", id, number);
                self.state = SessionState::Done;
                Ok(updated)
            }
            Err(err) => {
                self.state = SessionState::Resolved(Disposition::Found);
                Err(err.context("delivery update failed; form retained for retry"))
            }
        }
    }

    /// Fresh registration: create a delivery for `code` with no prior
    /// lookup. Distinct from the resolve path: a missed lookup never falls
    /// through to here.
    pub fn register(&mut self, code: &str, form: &DeliveryForm) -> Result<DeliveryRecord> {
        if self.state != SessionState::Idle {
            return Err(anyhow!("registration requires a fresh workflow"));
        }
        let number = form.unit()?;
        self.state = SessionState::Submitting;
        let delivery = NewDelivery {
            reader_code: code,
            block: form.block,
            number,
            apartment_id: self.apartment_id,
        };
        match self.client.create(&delivery) {
            Ok(created) => {
                log::info!("delivery registered for '{}' (unit {})", code, number);
                self.state = SessionState::Done;
                Ok(created)
            }
            Err(err) => {
                self.state = SessionState::Idle;
                Err(err.context("delivery creation failed; retry with the same details"))
            }
        }
    }

    /// Abandon the session. Discards the captured still explicitly.
    pub fn abandon(&mut self) {
        if self.state == SessionState::Done {
            return;
        }
        if self.scan.take().is_some() {
            log::info!("session abandoned; discarding captured still");
        }
        self.state = SessionState::Aborted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: u32) -> DeliveryRecord {
        DeliveryRecord {
            id: Some(7),
            reader_code: "ABC999".into(),
            block: Block::B,
            number,
            apartment_id: 1,
            delivered: false,
        }
    }

    #[test]
    fn form_prefills_by_splitting_the_unit() {
        let form = DeliveryForm::from_record(&record(45)).unwrap();
        assert_eq!((form.floor, form.slot), (4, 5));
        assert_eq!(form.block, Block::B);

        let form = DeliveryForm::from_record(&record(123)).unwrap();
        assert_eq!((form.floor, form.slot), (12, 3));
    }

    #[test]
    fn form_rejects_malformed_stored_units() {
        assert!(DeliveryForm::from_record(&record(7)).is_err());
        assert!(DeliveryForm::from_record(&record(191)).is_err());
    }

    #[test]
    fn form_validates_ranges_on_construction() {
        assert!(DeliveryForm::new(Block::A, 18, 6).is_ok());
        assert!(DeliveryForm::new(Block::A, 0, 1).is_err());
        assert!(DeliveryForm::new(Block::A, 1, 7).is_err());
    }

    #[test]
    fn form_edits_reencode_the_unit() {
        let mut form = DeliveryForm::new(Block::A, 4, 5).unwrap();
        form.floor = 12;
        form.slot = 3;
        assert_eq!(form.unit().unwrap(), 123);
    }
}
