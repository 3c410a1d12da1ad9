use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Description,
    Text,
    WrittenDate,
    Writer,
    ActionId,
    UniqueId,
    Owner,
    Duration,
    Decaying,
    CorpseOwner,
    Charges,
    FluidType,
    DoorId,
}

bitflags! {
    /// Presence bits for [`ItemAttributes`]; one bit per [`AttributeKind`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AttributeSet: u32 {
        const DESCRIPTION  = 1 << 0;
        const TEXT         = 1 << 1;
        const WRITTEN_DATE = 1 << 2;
        const WRITER       = 1 << 3;
        const ACTION_ID    = 1 << 4;
        const UNIQUE_ID    = 1 << 5;
        const OWNER        = 1 << 6;
        const DURATION     = 1 << 7;
        const DECAYING     = 1 << 8;
        const CORPSE_OWNER = 1 << 9;
        const CHARGES      = 1 << 10;
        const FLUID_TYPE   = 1 << 11;
        const DOOR_ID      = 1 << 12;
    }
}

impl AttributeKind {
    pub fn flag(self) -> AttributeSet {
        match self {
            Self::Description => AttributeSet::DESCRIPTION,
            Self::Text => AttributeSet::TEXT,
            Self::WrittenDate => AttributeSet::WRITTEN_DATE,
            Self::Writer => AttributeSet::WRITER,
            Self::ActionId => AttributeSet::ACTION_ID,
            Self::UniqueId => AttributeSet::UNIQUE_ID,
            Self::Owner => AttributeSet::OWNER,
            Self::Duration => AttributeSet::DURATION,
            Self::Decaying => AttributeSet::DECAYING,
            Self::CorpseOwner => AttributeSet::CORPSE_OWNER,
            Self::Charges => AttributeSet::CHARGES,
            Self::FluidType => AttributeSet::FLUID_TYPE,
            Self::DoorId => AttributeSet::DOOR_ID,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Description | Self::Text | Self::Writer)
    }

    pub fn is_integer(self) -> bool {
        !self.is_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayState {
    #[default]
    False = 0,
    Pending = 1,
    True = 2,
}

impl DecayState {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => Self::Pending,
            2 => Self::True,
            _ => Self::False,
        }
    }
}

pub const MIN_ACTION_ID: i32 = 100;
pub const MIN_UNIQUE_ID: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Int(i32),
    Str(String),
}

/// Sparse per-item attribute bag.
///
/// Absent attributes read back as `""` or `0`, the same as attributes that
/// were set to those values. Callers treat an empty text as "no text".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemAttributes {
    present: AttributeSet,
    entries: Vec<(AttributeKind, AttributeValue)>,
}

impl ItemAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_attribute(&self, kind: AttributeKind) -> bool {
        self.present.contains(kind.flag())
    }

    pub fn present(&self) -> AttributeSet {
        self.present
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    fn entry_mut(&mut self, kind: AttributeKind) -> Option<&mut AttributeValue> {
        if !self.has_attribute(kind) {
            return None;
        }
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, value)| value)
    }

    fn entry(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        if !self.has_attribute(kind) {
            return None;
        }
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, value)| value)
    }

    fn put(&mut self, kind: AttributeKind, value: AttributeValue) {
        if let Some(slot) = self.entry_mut(kind) {
            *slot = value;
            return;
        }
        if self.entries.capacity() == 0 {
            self.entries.reserve_exact(1);
        }
        // Ordered by kind so equal bags compare equal whatever the set order.
        let bit = kind.flag().bits();
        let at = self
            .entries
            .partition_point(|(k, _)| k.flag().bits() < bit);
        self.entries.insert(at, (kind, value));
        self.present.insert(kind.flag());
    }

    pub fn set_str_attr(&mut self, kind: AttributeKind, value: &str) {
        if !kind.is_string() || value.is_empty() {
            return;
        }
        self.put(kind, AttributeValue::Str(value.to_string()));
    }

    pub fn get_str_attr(&self, kind: AttributeKind) -> &str {
        match self.entry(kind) {
            Some(AttributeValue::Str(value)) if kind.is_string() => value,
            _ => "",
        }
    }

    pub fn set_int_attr(&mut self, kind: AttributeKind, value: i32) {
        if !kind.is_integer() {
            return;
        }
        self.put(kind, AttributeValue::Int(value));
    }

    pub fn increase_int_attr(&mut self, kind: AttributeKind, delta: i32) {
        if !kind.is_integer() {
            return;
        }
        if let Some(AttributeValue::Int(value)) = self.entry_mut(kind) {
            *value = value.wrapping_add(delta);
            return;
        }
        self.put(kind, AttributeValue::Int(delta));
    }

    pub fn get_int_attr(&self, kind: AttributeKind) -> i32 {
        match self.entry(kind) {
            Some(AttributeValue::Int(value)) if kind.is_integer() => *value,
            _ => 0,
        }
    }

    pub fn remove_attribute(&mut self, kind: AttributeKind) {
        if !self.has_attribute(kind) {
            return;
        }
        self.entries.retain(|(k, _)| *k != kind);
        self.present.remove(kind.flag());
    }

    pub fn special_description(&self) -> &str {
        self.get_str_attr(AttributeKind::Description)
    }

    pub fn set_special_description(&mut self, value: &str) {
        self.set_str_attr(AttributeKind::Description, value);
    }

    pub fn text(&self) -> &str {
        self.get_str_attr(AttributeKind::Text)
    }

    pub fn set_text(&mut self, value: &str) {
        self.set_str_attr(AttributeKind::Text, value);
    }

    pub fn writer(&self) -> &str {
        self.get_str_attr(AttributeKind::Writer)
    }

    pub fn set_writer(&mut self, value: &str) {
        self.set_str_attr(AttributeKind::Writer, value);
    }

    pub fn written_date(&self) -> u32 {
        self.get_int_attr(AttributeKind::WrittenDate) as u32
    }

    pub fn set_written_date(&mut self, epoch_secs: u32) {
        self.set_int_attr(AttributeKind::WrittenDate, epoch_secs as i32);
    }

    pub fn action_id(&self) -> u16 {
        self.get_int_attr(AttributeKind::ActionId) as u16
    }

    pub fn set_action_id(&mut self, value: u16) {
        self.set_int_attr(AttributeKind::ActionId, i32::from(value).max(MIN_ACTION_ID));
    }

    pub fn unique_id(&self) -> u16 {
        self.get_int_attr(AttributeKind::UniqueId) as u16
    }

    pub fn set_unique_id(&mut self, value: u16) {
        self.set_int_attr(AttributeKind::UniqueId, i32::from(value).max(MIN_UNIQUE_ID));
    }

    pub fn charges(&self) -> u16 {
        self.get_int_attr(AttributeKind::Charges) as u16
    }

    pub fn set_charges(&mut self, value: u16) {
        self.set_int_attr(AttributeKind::Charges, i32::from(value));
    }

    pub fn fluid_type(&self) -> u16 {
        self.get_int_attr(AttributeKind::FluidType) as u16
    }

    pub fn set_fluid_type(&mut self, value: u16) {
        self.set_int_attr(AttributeKind::FluidType, i32::from(value));
    }

    pub fn owner(&self) -> u32 {
        self.get_int_attr(AttributeKind::Owner) as u32
    }

    pub fn set_owner(&mut self, owner: u32) {
        self.set_int_attr(AttributeKind::Owner, owner as i32);
    }

    pub fn corpse_owner(&self) -> u32 {
        self.get_int_attr(AttributeKind::CorpseOwner) as u32
    }

    pub fn set_corpse_owner(&mut self, owner: u32) {
        self.set_int_attr(AttributeKind::CorpseOwner, owner as i32);
    }

    pub fn duration(&self) -> i32 {
        self.get_int_attr(AttributeKind::Duration)
    }

    pub fn set_duration(&mut self, millis: i32) {
        self.set_int_attr(AttributeKind::Duration, millis);
    }

    pub fn decrease_duration(&mut self, millis: i32) {
        self.increase_int_attr(AttributeKind::Duration, millis.wrapping_neg());
    }

    pub fn decaying(&self) -> DecayState {
        DecayState::from_raw(self.get_int_attr(AttributeKind::Decaying))
    }

    pub fn set_decaying(&mut self, state: DecayState) {
        self.set_int_attr(AttributeKind::Decaying, state as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (*state >> 32) as u32
    }

    const ALL: [AttributeKind; 13] = [
        AttributeKind::Description,
        AttributeKind::Text,
        AttributeKind::WrittenDate,
        AttributeKind::Writer,
        AttributeKind::ActionId,
        AttributeKind::UniqueId,
        AttributeKind::Owner,
        AttributeKind::Duration,
        AttributeKind::Decaying,
        AttributeKind::CorpseOwner,
        AttributeKind::Charges,
        AttributeKind::FluidType,
        AttributeKind::DoorId,
    ];

    #[test]
    fn wrong_accessor_is_a_noop() {
        let mut attrs = ItemAttributes::new();
        attrs.set_str_attr(AttributeKind::ActionId, "nope");
        attrs.set_int_attr(AttributeKind::Text, 5);
        attrs.increase_int_attr(AttributeKind::Writer, 5);
        assert!(attrs.is_empty());
        attrs.set_int_attr(AttributeKind::Charges, 3);
        assert_eq!(attrs.get_str_attr(AttributeKind::Charges), "");
    }

    #[test]
    fn empty_string_is_not_stored() {
        let mut attrs = ItemAttributes::new();
        attrs.set_text("");
        assert!(!attrs.has_attribute(AttributeKind::Text));
        attrs.set_text("hello");
        attrs.set_text("");
        assert_eq!(attrs.text(), "hello");
    }

    #[test]
    fn absent_and_default_read_the_same() {
        let mut attrs = ItemAttributes::new();
        assert_eq!(attrs.get_int_attr(AttributeKind::Owner), 0);
        attrs.set_owner(0);
        assert!(attrs.has_attribute(AttributeKind::Owner));
        assert_eq!(attrs.get_int_attr(AttributeKind::Owner), 0);
    }

    #[test]
    fn id_setters_clamp_to_floor() {
        let mut attrs = ItemAttributes::new();
        attrs.set_action_id(5);
        attrs.set_unique_id(20);
        assert_eq!(attrs.action_id(), 100);
        assert_eq!(attrs.unique_id(), 1000);
        attrs.set_action_id(2000);
        assert_eq!(attrs.action_id(), 2000);
    }

    #[test]
    fn duration_counts_down_and_wraps() {
        let mut attrs = ItemAttributes::new();
        attrs.decrease_duration(50);
        assert_eq!(attrs.duration(), -50);
        attrs.set_duration(1000);
        attrs.decrease_duration(250);
        assert_eq!(attrs.duration(), 750);
        attrs.set_duration(i32::MAX);
        attrs.increase_int_attr(AttributeKind::Duration, 1);
        assert_eq!(attrs.duration(), i32::MIN);
    }

    #[test]
    fn clone_is_deep() {
        let mut attrs = ItemAttributes::new();
        attrs.set_text("original");
        attrs.set_writer("someone");
        attrs.set_charges(4);
        let mut copy = attrs.clone();
        copy.set_text("changed");
        copy.remove_attribute(AttributeKind::Writer);
        copy.set_charges(9);
        assert_eq!(attrs.text(), "original");
        assert_eq!(attrs.writer(), "someone");
        assert_eq!(attrs.charges(), 4);
        assert_eq!(copy.text(), "changed");
    }

    #[test]
    fn equality_ignores_set_order() {
        let mut first = ItemAttributes::new();
        first.set_int_attr(AttributeKind::ActionId, 2000);
        first.set_str_attr(AttributeKind::Text, "hello");
        first.set_int_attr(AttributeKind::Charges, 3);

        let mut second = ItemAttributes::new();
        second.set_int_attr(AttributeKind::Charges, 3);
        second.set_str_attr(AttributeKind::Text, "hello");
        second.set_int_attr(AttributeKind::ActionId, 2000);
        assert_eq!(first, second);

        second.set_int_attr(AttributeKind::Charges, 4);
        assert_ne!(first, second);
        second.set_int_attr(AttributeKind::Charges, 3);
        second.remove_attribute(AttributeKind::Text);
        assert_ne!(first, second);
        second.set_str_attr(AttributeKind::Text, "hello");
        assert_eq!(first, second);
    }

    #[test]
    fn presence_bits_track_entries() {
        let mut state = 0xabcd_ef01_2345_6789;
        let mut attrs = ItemAttributes::new();
        for _ in 0..2000 {
            let kind = ALL[(lcg_next(&mut state) as usize) % ALL.len()];
            match lcg_next(&mut state) % 3 {
                0 => attrs.remove_attribute(kind),
                1 if kind.is_string() => attrs.set_str_attr(kind, "x"),
                _ => attrs.set_int_attr(kind, lcg_next(&mut state) as i32),
            }
            for kind in ALL {
                let count = attrs.entries.iter().filter(|(k, _)| *k == kind).count();
                assert_eq!(attrs.has_attribute(kind), count == 1);
                assert!(count <= 1);
            }
            assert_eq!(attrs.entries.len(), attrs.present.bits().count_ones() as usize);
        }
    }
}
