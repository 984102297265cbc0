//! NACHA record layouts
//!
//! Every record is 94 bytes; field 1 is the one-character record type code.
//! The layouts double as envelope templates for validation and as the field
//! widths the serializer pads to.

use edi_ir::Format;
use edi_schema::{
    DataType, SchemaRegistry, TemplateDataElement, TemplateEnvelope, TemplateLoop, TemplateSegment,
    TemplateTransactionSet,
};

/// Physical record length
pub const RECORD_WIDTH: usize = 94;

/// Records per block
pub const BLOCKING_FACTOR: usize = 10;

/// Segment id given to a batch header carrying a CBR/PBR entry class
pub const CROSS_BORDER_HEADER: &str = "5CB";

/// Byte range of the standard entry class code in a batch header
pub const SEC_RANGE: std::ops::Range<usize> = 50..53;

/// Byte range of the batch number in batch header and control records
pub const BATCH_NUMBER_RANGE: std::ops::Range<usize> = 87..94;

/// Entry classes whose batch header uses the cross-border layout
pub const CROSS_BORDER_CLASSES: [&str; 2] = ["CBR", "PBR"];

/// Entry classes registered by [`register_defaults`]
pub const STANDARD_ENTRY_CLASSES: [&str; 9] = ["PPD", "CCD", "CTX", "WEB", "TEL", "ARC", "BOC", "CBR", "PBR"];

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Number,
    Amount,
    Date,
    Time,
}

struct Field(&'static str, &'static str, usize, Kind, bool);

fn record(id: &str, name: &str, fields: &[Field]) -> TemplateSegment {
    fields
        .iter()
        .enumerate()
        .fold(TemplateSegment::new(id, name), |segment, (i, &Field(fid, fname, width, kind, required))| {
            let (data_type, min) = match kind {
                Kind::Text => (DataType::Alphanumeric, 1),
                Kind::Number => (DataType::Numeric(0), width),
                Kind::Amount => (DataType::Numeric(2), width),
                Kind::Date => (DataType::Date, width),
                Kind::Time => (DataType::Time, width),
            };
            let mut element = TemplateDataElement::new(fid, fname, i + 1, data_type, min, width);
            if required {
                element = element.required();
            }
            segment.with_element(element)
        })
}

use Kind::{Amount, Date, Number, Text, Time};

/// Record type 1
pub fn file_header() -> TemplateSegment {
    record(
        "1",
        "FileHeader",
        &[
            Field("101", "RecordTypeCode", 1, Text, true),
            Field("102", "PriorityCode", 2, Number, true),
            Field("103", "ImmediateDestination", 10, Text, true),
            Field("104", "ImmediateOrigin", 10, Text, true),
            Field("105", "FileCreationDate", 6, Date, true),
            Field("106", "FileCreationTime", 4, Time, false),
            Field("107", "FileIdModifier", 1, Text, true),
            Field("108", "RecordSize", 3, Number, true),
            Field("109", "BlockingFactor", 2, Number, true),
            Field("110", "FormatCode", 1, Number, true),
            Field("111", "ImmediateDestinationName", 23, Text, false),
            Field("112", "ImmediateOriginName", 23, Text, false),
            Field("113", "ReferenceCode", 8, Text, false),
        ],
    )
    .required()
}

/// Record type 5
pub fn batch_header() -> TemplateSegment {
    record(
        "5",
        "BatchHeader",
        &[
            Field("501", "RecordTypeCode", 1, Text, true),
            Field("502", "ServiceClassCode", 3, Number, true),
            Field("503", "CompanyName", 16, Text, true),
            Field("504", "CompanyDiscretionaryData", 20, Text, false),
            Field("505", "CompanyIdentification", 10, Text, true),
            Field("506", "StandardEntryClassCode", 3, Text, true),
            Field("507", "CompanyEntryDescription", 10, Text, true),
            Field("508", "CompanyDescriptiveDate", 6, Text, false),
            Field("509", "EffectiveEntryDate", 6, Date, false),
            Field("510", "SettlementDate", 3, Text, false),
            Field("511", "OriginatorStatusCode", 1, Text, true),
            Field("512", "OriginatingDfiIdentification", 8, Number, true),
            Field("513", "BatchNumber", 7, Number, true),
        ],
    )
    .required()
}

/// Record type 5 for CBR/PBR batches
pub fn cross_border_batch_header() -> TemplateSegment {
    record(
        CROSS_BORDER_HEADER,
        "CrossBorderBatchHeader",
        &[
            Field("5CB01", "RecordTypeCode", 1, Text, true),
            Field("5CB02", "ServiceClassCode", 3, Number, true),
            Field("5CB03", "CompanyName", 16, Text, true),
            Field("5CB04", "ForeignExchangeIndicator", 2, Text, true),
            Field("5CB05", "ForeignExchangeReferenceIndicator", 1, Number, true),
            Field("5CB06", "ForeignExchangeReference", 15, Text, false),
            Field("5CB07", "IsoDestinationCountryCode", 2, Text, true),
            Field("5CB08", "CompanyIdentification", 10, Text, true),
            Field("5CB09", "StandardEntryClassCode", 3, Text, true),
            Field("5CB10", "CompanyEntryDescription", 10, Text, true),
            Field("5CB11", "IsoOriginatingCurrencyCode", 3, Text, true),
            Field("5CB12", "IsoDestinationCurrencyCode", 3, Text, true),
            Field("5CB13", "EffectiveEntryDate", 6, Date, false),
            Field("5CB14", "SettlementDate", 3, Text, false),
            Field("5CB15", "OriginatorStatusCode", 1, Text, true),
            Field("5CB16", "OriginatingDfiIdentification", 8, Number, true),
            Field("5CB17", "BatchNumber", 7, Number, true),
        ],
    )
    .required()
}

/// Record type 6
pub fn entry_detail() -> TemplateSegment {
    record(
        "6",
        "EntryDetail",
        &[
            Field("601", "RecordTypeCode", 1, Text, true),
            Field("602", "TransactionCode", 2, Number, true),
            Field("603", "ReceivingDfiIdentification", 8, Number, true),
            Field("604", "CheckDigit", 1, Number, true),
            Field("605", "DfiAccountNumber", 17, Text, true),
            Field("606", "Amount", 10, Amount, true),
            Field("607", "IdentificationNumber", 15, Text, false),
            Field("608", "ReceivingName", 22, Text, false),
            Field("609", "DiscretionaryData", 2, Text, false),
            Field("610", "AddendaRecordIndicator", 1, Number, true),
            Field("611", "TraceNumber", 15, Number, true),
        ],
    )
    .required()
}

/// Record type 7
pub fn addenda() -> TemplateSegment {
    record(
        "7",
        "Addenda",
        &[
            Field("701", "RecordTypeCode", 1, Text, true),
            Field("702", "AddendaTypeCode", 2, Number, true),
            Field("703", "PaymentRelatedInformation", 80, Text, false),
            Field("704", "AddendaSequenceNumber", 4, Number, true),
            Field("705", "EntryDetailSequenceNumber", 7, Number, true),
        ],
    )
    .max_use(9999)
}

/// Record type 8
pub fn batch_control() -> TemplateSegment {
    record(
        "8",
        "BatchControl",
        &[
            Field("801", "RecordTypeCode", 1, Text, true),
            Field("802", "ServiceClassCode", 3, Number, true),
            Field("803", "EntryAddendaCount", 6, Number, true),
            Field("804", "EntryHash", 10, Number, true),
            Field("805", "TotalDebitAmount", 12, Amount, true),
            Field("806", "TotalCreditAmount", 12, Amount, true),
            Field("807", "CompanyIdentification", 10, Text, false),
            Field("808", "MessageAuthenticationCode", 19, Text, false),
            Field("809", "Reserved", 6, Text, false),
            Field("810", "OriginatingDfiIdentification", 8, Number, true),
            Field("811", "BatchNumber", 7, Number, true),
        ],
    )
    .required()
}

/// Record type 9
pub fn file_control() -> TemplateSegment {
    record(
        "9",
        "FileControl",
        &[
            Field("901", "RecordTypeCode", 1, Text, true),
            Field("902", "BatchCount", 6, Number, true),
            Field("903", "BlockCount", 6, Number, true),
            Field("904", "EntryAddendaCount", 8, Number, true),
            Field("905", "EntryHash", 10, Number, true),
            Field("906", "TotalDebitAmount", 12, Amount, true),
            Field("907", "TotalCreditAmount", 12, Amount, true),
            Field("908", "Reserved", 39, Text, false),
        ],
    )
    .required()
}

/// Layout of a record by segment id
pub fn layout_for(id: &str) -> Option<TemplateSegment> {
    match id {
        "1" => Some(file_header()),
        "5" => Some(batch_header()),
        CROSS_BORDER_HEADER => Some(cross_border_batch_header()),
        "6" => Some(entry_detail()),
        "7" => Some(addenda()),
        "8" => Some(batch_control()),
        "9" => Some(file_control()),
        _ => None,
    }
}

/// Envelope templates: the file is the interchange, each batch a transaction set
pub fn ach_envelope() -> TemplateEnvelope {
    TemplateEnvelope {
        format: Format::Ach,
        service_advice: None,
        header: file_header(),
        trailer: file_control(),
        group_header: None,
        group_trailer: None,
        set_header: Some(batch_header()),
        set_trailer: Some(batch_control()),
    }
}

/// Body template shared by the standard entry classes: entries with addenda
pub fn entry_batch(entry_class: &str) -> TemplateTransactionSet {
    TemplateTransactionSet::new(entry_class, format!("{entry_class} batch")).with(
        TemplateLoop::new("entry", "Entry", entry_detail())
            .max_use(usize::MAX)
            .with(addenda()),
    )
}

/// Register the standard entry class templates and the ACH envelope
pub fn register_defaults(registry: &SchemaRegistry) {
    for class in STANDARD_ENTRY_CLASSES {
        registry.register(entry_batch(class));
    }
    registry.register_envelope(ach_envelope());
}
