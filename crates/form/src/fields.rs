//! User editable echoes of the fee baseline.
//!
//! Every field is kept as the text the user typed. A field the user has not touched follows the
//! latest snapshot; a touched field keeps its text and overrides the baseline as long as it
//! parses.

use alloy_primitives::U256;
use confirm_common::{
    InvalidNumericInput, to_atomic, to_display,
    errors::NumericInputReason,
    units::{GWEI_DECIMALS, TEZ_DECIMALS, parse_gwei, parse_integer},
};
use confirm_estimation::{
    FeeOptionLabel,
    evm::{EvmOverrides, EvmSnapshot, GasPrice},
    tezos::{TezosOverrides, TezosSnapshot},
};
use derive_more::Display;
use std::collections::{BTreeMap, BTreeSet};

/// An editable field of the form.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    /// Total Tezos fee, in tez.
    #[display("fee")]
    Fee,
    /// Total Tezos storage limit, in bytes.
    #[display("storage limit")]
    StorageLimit,
    /// EVM max fee (or gas price) per gas, in gwei.
    #[display("gas price")]
    GasPrice,
    /// EVM gas limit.
    #[display("gas limit")]
    GasLimit,
    /// EVM nonce.
    #[display("nonce")]
    Nonce,
}

/// Rejected edit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// The text does not parse; kept next to the field.
    #[error(transparent)]
    Invalid(#[from] InvalidNumericInput),
    /// The field does not exist for this chain.
    #[error("{field} does not apply to {chain} operations")]
    NotApplicable {
        /// The edited field.
        field: FormField,
        /// The chain of the form.
        chain: &'static str,
    },
}

/// Touched fields and inline errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Edits {
    touched: BTreeSet<FormField>,
    errors: BTreeMap<FormField, InvalidNumericInput>,
}

impl Edits {
    fn record<T>(
        &mut self,
        field: FormField,
        parsed: Result<T, InvalidNumericInput>,
    ) -> Result<T, FieldError> {
        self.touched.insert(field);
        match parsed {
            Ok(value) => {
                self.errors.remove(&field);
                Ok(value)
            }
            Err(err) => {
                self.errors.insert(field, err.clone());
                Err(err.into())
            }
        }
    }

    fn untouch(&mut self, field: FormField) {
        self.touched.remove(&field);
        self.errors.remove(&field);
    }

    /// The parsed value of a touched, valid field.
    fn custom<T>(
        &self,
        field: FormField,
        text: &str,
        parse: fn(&str) -> Result<T, InvalidNumericInput>,
    ) -> Option<T> {
        self.touched.contains(&field).then(|| parse(text).ok()).flatten()
    }
}

/// Parses a fee entered in tez into mutez.
pub fn parse_tez(text: &str) -> Result<u64, InvalidNumericInput> {
    let mutez = to_atomic(text, TEZ_DECIMALS)?;
    u64::try_from(mutez).map_err(|_| InvalidNumericInput::new(text, NumericInputReason::Overflow))
}

/// Form state of a Tezos batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TezosFormData {
    /// Total fee, in tez.
    pub fee: String,
    /// Total storage limit, in bytes.
    pub storage_limit: String,
    /// Hex encoded forged batch, for display.
    pub forged_bytes: Option<String>,
    /// The forged contents as JSON, for display.
    pub raw_json: Option<serde_json::Value>,
    edits: Edits,
}

impl TezosFormData {
    /// Defaults taken from a snapshot.
    pub fn from_snapshot(snapshot: &TezosSnapshot) -> Self {
        let mut form = Self::default();
        form.sync(snapshot);
        form
    }

    /// Updates untouched fields and the raw caches from `snapshot`.
    pub fn sync(&mut self, snapshot: &TezosSnapshot) {
        if !self.edits.touched.contains(&FormField::Fee) {
            self.fee = to_display(U256::from(snapshot.fee), TEZ_DECIMALS);
        }
        if !self.edits.touched.contains(&FormField::StorageLimit) {
            self.storage_limit = snapshot.storage_limit.to_string();
        }
        self.forged_bytes = snapshot.is_forged().then(|| snapshot.forged_bytes.clone());
        self.raw_json = serde_json::to_value(&snapshot.contents).ok();
    }

    fn edit(&mut self, field: FormField, text: String) -> Result<(), FieldError> {
        match field {
            FormField::Fee => {
                let parsed = parse_tez(&text);
                self.fee = text;
                self.edits.record(field, parsed)?;
            }
            FormField::StorageLimit => {
                let parsed = parse_integer(&text);
                self.storage_limit = text;
                self.edits.record(field, parsed)?;
            }
            field => return Err(FieldError::NotApplicable { field, chain: "tezos" }),
        }
        Ok(())
    }

    /// Custom total fee in mutez, if the fee field was edited and parses.
    pub fn custom_fee(&self) -> Option<u64> {
        self.edits.custom(FormField::Fee, &self.fee, parse_tez)
    }

    /// Custom total storage limit, if the field was edited and parses.
    pub fn custom_storage_limit(&self) -> Option<u64> {
        self.edits.custom(FormField::StorageLimit, &self.storage_limit, parse_integer)
    }
}

/// Form state of an EVM transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvmFormData {
    /// Max fee (or gas price) per gas, in gwei.
    pub gas_price: String,
    /// Gas limit.
    pub gas_limit: String,
    /// Nonce, empty while unknown.
    pub nonce: String,
    /// Hex encoded unsigned transaction, for display.
    pub serialized: Option<String>,
    /// The resolved request as JSON, for display.
    pub request_json: Option<serde_json::Value>,
    edits: Edits,
}

impl EvmFormData {
    /// Defaults taken from a snapshot.
    pub fn from_snapshot(snapshot: &EvmSnapshot) -> Self {
        let mut form = Self::default();
        form.sync(snapshot);
        form
    }

    /// Updates untouched fields and the raw caches from `snapshot`.
    pub fn sync(&mut self, snapshot: &EvmSnapshot) {
        let resolved = &snapshot.resolved;
        if !self.edits.touched.contains(&FormField::GasPrice) {
            let price = GasPrice::from_request(resolved).unwrap_or(snapshot.baseline.gas_price);
            self.gas_price = to_display(U256::from(price.max_fee()), GWEI_DECIMALS);
        }
        if !self.edits.touched.contains(&FormField::GasLimit) {
            self.gas_limit = resolved.gas.unwrap_or(snapshot.baseline.gas_limit).to_string();
        }
        if !self.edits.touched.contains(&FormField::Nonce) {
            self.nonce = resolved.nonce.map(|nonce| nonce.to_string()).unwrap_or_default();
        }
        self.serialized = snapshot.serialized.as_ref().map(ToString::to_string);
        self.request_json = serde_json::to_value(resolved).ok();
    }

    fn edit(&mut self, field: FormField, text: String) -> Result<(), FieldError> {
        match field {
            FormField::GasPrice => {
                let parsed = parse_gwei(&text);
                self.gas_price = text;
                self.edits.record(field, parsed)?;
            }
            FormField::GasLimit => {
                let parsed = parse_integer(&text);
                self.gas_limit = text;
                self.edits.record(field, parsed)?;
            }
            FormField::Nonce => {
                let parsed = parse_integer(&text);
                self.nonce = text;
                self.edits.record(field, parsed)?;
            }
            field => return Err(FieldError::NotApplicable { field, chain: "evm" }),
        }
        Ok(())
    }

    /// Custom max fee per gas in wei, if the field was edited and parses.
    pub fn custom_gas_price(&self) -> Option<u128> {
        self.edits.custom(FormField::GasPrice, &self.gas_price, parse_gwei)
    }

    /// Custom gas limit, if the field was edited and parses.
    pub fn custom_gas_limit(&self) -> Option<u64> {
        self.edits.custom(FormField::GasLimit, &self.gas_limit, parse_integer)
    }

    /// Custom nonce, if the field was edited and parses.
    pub fn custom_nonce(&self) -> Option<u64> {
        self.edits.custom(FormField::Nonce, &self.nonce, parse_integer)
    }
}

/// Form state of either chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxParamsFormData {
    /// A Tezos batch.
    Tezos(TezosFormData),
    /// An EVM transaction.
    Evm(EvmFormData),
}

impl TxParamsFormData {
    fn edits(&self) -> &Edits {
        match self {
            Self::Tezos(form) => &form.edits,
            Self::Evm(form) => &form.edits,
        }
    }

    fn edits_mut(&mut self) -> &mut Edits {
        match self {
            Self::Tezos(form) => &mut form.edits,
            Self::Evm(form) => &mut form.edits,
        }
    }

    /// Replaces the text of `field`, marking it touched.
    ///
    /// Text that does not parse is kept, together with its error, so the user can fix it.
    pub fn edit(&mut self, field: FormField, text: impl Into<String>) -> Result<(), FieldError> {
        let text = text.into();
        match self {
            Self::Tezos(form) => form.edit(field, text),
            Self::Evm(form) => form.edit(field, text),
        }
    }

    /// Lets `field` follow the snapshot again.
    pub fn untouch(&mut self, field: FormField) {
        self.edits_mut().untouch(field);
    }

    /// The text of `field`, `None` if it does not apply to this chain.
    pub fn value(&self, field: FormField) -> Option<&str> {
        let text = match (self, field) {
            (Self::Tezos(form), FormField::Fee) => &form.fee,
            (Self::Tezos(form), FormField::StorageLimit) => &form.storage_limit,
            (Self::Evm(form), FormField::GasPrice) => &form.gas_price,
            (Self::Evm(form), FormField::GasLimit) => &form.gas_limit,
            (Self::Evm(form), FormField::Nonce) => &form.nonce,
            _ => return None,
        };
        Some(text)
    }

    /// Whether the user edited `field`.
    pub fn is_touched(&self, field: FormField) -> bool {
        self.edits().touched.contains(&field)
    }

    /// The touched fields.
    pub fn touched(&self) -> &BTreeSet<FormField> {
        &self.edits().touched
    }

    /// The inline error of `field`.
    pub fn error(&self, field: FormField) -> Option<&InvalidNumericInput> {
        self.edits().errors.get(&field)
    }

    /// Pipeline overrides of a Tezos form; no custom values for other chains.
    pub fn tezos_overrides(&self, selected: Option<FeeOptionLabel>) -> TezosOverrides {
        match self {
            Self::Tezos(form) => TezosOverrides {
                custom_fee: form.custom_fee(),
                custom_storage_limit: form.custom_storage_limit(),
                selected,
            },
            Self::Evm(_) => TezosOverrides { selected, ..Default::default() },
        }
    }

    /// Pipeline overrides of an EVM form; no custom values for other chains.
    pub fn evm_overrides(&self, selected: Option<FeeOptionLabel>) -> EvmOverrides {
        match self {
            Self::Evm(form) => EvmOverrides {
                custom_gas_price: form.custom_gas_price(),
                custom_gas_limit: form.custom_gas_limit(),
                custom_nonce: form.custom_nonce(),
                selected,
            },
            Self::Tezos(_) => EvmOverrides { selected, ..Default::default() },
        }
    }

    /// The first field that does not parse.
    pub fn first_error(&self) -> Option<(FormField, &InvalidNumericInput)> {
        self.edits().errors.iter().next().map(|(field, err)| (*field, err))
    }
}
