use crate::domain::disbursement::DisbursementRequest;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct RequestRow<'a> {
    id: String,
    tenant: &'a str,
    status: String,
    amount: &'a str,
    token: &'a str,
    recipient: &'a str,
    requested_by: &'a str,
    executed_by: &'a str,
    tx_hash: &'a str,
}

impl<'a> From<&'a DisbursementRequest> for RequestRow<'a> {
    fn from(request: &'a DisbursementRequest) -> Self {
        Self {
            id: request.id.to_string(),
            tenant: &request.tenant_id,
            status: request.status.to_string(),
            amount: &request.amount,
            token: request.token_address.as_str(),
            recipient: request.recipient_address.as_str(),
            requested_by: &request.requested_by,
            executed_by: request.executed_by.as_deref().unwrap_or(""),
            tx_hash: request.blockchain_tx_hash.as_deref().unwrap_or(""),
        }
    }
}

/// Writes disbursement requests as CSV, one row per request.
pub struct RequestWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RequestWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_requests<'a>(
        &mut self,
        requests: impl IntoIterator<Item = &'a DisbursementRequest>,
    ) -> Result<()> {
        let mut wrote_any = false;
        for request in requests {
            self.writer.serialize(RequestRow::from(request))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "id",
                "tenant",
                "status",
                "amount",
                "token",
                "recipient",
                "requested_by",
                "executed_by",
                "tx_hash",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
