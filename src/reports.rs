//! Reporting Exports
//!
//! Snapshot renders of the current record store for the admin surface.
//! These are point-in-time exports, not live feeds: each call reads the
//! store once and serializes what it saw.

use anyhow::Result;

use crate::store::Registrant;

/// CSV snapshot of every registrant, newest first.
pub fn csv_snapshot(rows: &[Registrant]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Unique ID",
        "Name",
        "Email",
        "Mobile No",
        "Semester",
        "Party Size",
        "Payment Status",
        "Amount",
        "Attendance",
    ])?;
    for reg in rows {
        writer.write_record(&[
            reg.uid.as_str(),
            reg.name.as_str(),
            reg.email.as_str(),
            reg.phone.as_str(),
            &reg.semester.to_string(),
            &reg.party_size.to_string(),
            reg.payment_status.as_str(),
            &reg.amount().to_string(),
            if reg.attended { "Present" } else { "Absent" },
        ])?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PaymentStatus;

    #[test]
    fn test_csv_snapshot() {
        let rows = vec![Registrant {
            uid: "FEST-1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9000000001".to_string(),
            semester: 3,
            party_size: 2,
            amount_minor: 30_000,
            attended: true,
            upi_ref: None,
            payment_id: Some("pay_1".to_string()),
            order_id: None,
            payment_status: PaymentStatus::Paid,
            refund_id: None,
            refunded: false,
            created_at: 0,
        }];

        let csv = csv_snapshot(&rows).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Unique ID,"));
        let row = lines.next().unwrap();
        assert!(row.contains("FEST-1"));
        assert!(row.contains(",300,"));
        assert!(row.ends_with("Present"));
    }

    #[test]
    fn test_empty_snapshot_is_header_only() {
        let csv = csv_snapshot(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
