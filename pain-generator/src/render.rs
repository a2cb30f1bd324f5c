//! pain.001.001.03 rendering.
//!
//! Every document carries exactly one `<CdtTrfTxInf>`. `NbOfTxs` is therefore always `1` and
//! both `CtrlSum` fields equal the instructed amount.

use std::borrow::Cow;

use crate::transaction::Transaction;

pub const PAIN_001_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03";

/// Whether text substituted into the template is XML-escaped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapePolicy {
    /// Replace `& < > " '` with entity references
    #[default]
    Escape,
    /// Substitute values verbatim. A name such as `Smith & Sons` yields a document that is
    /// not well-formed.
    Raw,
}

impl EscapePolicy {
    #[must_use]
    pub fn apply<'s>(&self, value: &'s str) -> Cow<'s, str> {
        match self {
            EscapePolicy::Escape => escape_xml(value),
            EscapePolicy::Raw => Cow::Borrowed(value),
        }
    }
}

#[must_use]
pub fn escape_xml(raw: &str) -> Cow<'_, str> {
    if !raw.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 16);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Renders `tx` as a complete pain.001.001.03 document.
///
/// Output depends on nothing but `tx` and `policy`.
#[must_use]
pub fn render_pain001(tx: &Transaction<'_>, policy: EscapePolicy) -> String {
    let message_id = policy.apply(&tx.message_id);
    let created_at = policy.apply(&tx.created_at);
    let payment_info_id = policy.apply(&tx.payment_info_id);
    let end_to_end_id = policy.apply(&tx.end_to_end_id);
    let debtor_name = policy.apply(tx.debtor.name());
    let debtor_iban = policy.apply(tx.debtor.account_id());
    let creditor_name = policy.apply(tx.creditor.name());
    let creditor_iban = policy.apply(tx.creditor.account_id());
    let currency = policy.apply(&tx.currency);
    let amount = tx.amount.to_string();

    let mut xml = String::with_capacity(800 + 2 * debtor_name.len() + creditor_name.len());

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<Document xmlns=\"");
    xml.push_str(PAIN_001_NAMESPACE);
    xml.push_str("\">\n");
    xml.push_str("  <CstmrCdtTrfInitn>\n");

    xml.push_str("    <GrpHdr>\n");
    xml.push_str("      <MsgId>");
    xml.push_str(&message_id);
    xml.push_str("</MsgId>\n");
    xml.push_str("      <CreDtTm>");
    xml.push_str(&created_at);
    xml.push_str("</CreDtTm>\n");
    xml.push_str("      <NbOfTxs>1</NbOfTxs>\n");
    xml.push_str("      <CtrlSum>");
    xml.push_str(&amount);
    xml.push_str("</CtrlSum>\n");
    xml.push_str("      <InitgPty><Nm>");
    xml.push_str(&debtor_name);
    xml.push_str("</Nm></InitgPty>\n");
    xml.push_str("    </GrpHdr>\n");

    xml.push_str("    <PmtInf>\n");
    xml.push_str("      <PmtInfId>");
    xml.push_str(&payment_info_id);
    xml.push_str("</PmtInfId>\n");
    xml.push_str("      <PmtMtd>TRF</PmtMtd>\n");
    xml.push_str("      <NbOfTxs>1</NbOfTxs>\n");
    xml.push_str("      <CtrlSum>");
    xml.push_str(&amount);
    xml.push_str("</CtrlSum>\n");
    xml.push_str("      <Dbtr><Nm>");
    xml.push_str(&debtor_name);
    xml.push_str("</Nm></Dbtr>\n");
    xml.push_str("      <DbtrAcct><Id><IBAN>");
    xml.push_str(&debtor_iban);
    xml.push_str("</IBAN></Id></DbtrAcct>\n");

    xml.push_str("      <CdtTrfTxInf>\n");
    xml.push_str("        <PmtId><EndToEndId>");
    xml.push_str(&end_to_end_id);
    xml.push_str("</EndToEndId></PmtId>\n");
    xml.push_str("        <Amt><InstdAmt Ccy=\"");
    xml.push_str(&currency);
    xml.push_str("\">");
    xml.push_str(&amount);
    xml.push_str("</InstdAmt></Amt>\n");
    xml.push_str("        <Cdtr><Nm>");
    xml.push_str(&creditor_name);
    xml.push_str("</Nm></Cdtr>\n");
    xml.push_str("        <CdtrAcct><Id><IBAN>");
    xml.push_str(&creditor_iban);
    xml.push_str("</IBAN></Id></CdtrAcct>\n");
    xml.push_str("      </CdtTrfTxInf>\n");
    xml.push_str("    </PmtInf>\n");

    xml.push_str("  </CstmrCdtTrfInitn>\n");
    xml.push_str("</Document>\n");

    xml
}
