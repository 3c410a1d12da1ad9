use crate::entities::item_attributes::{AttributeKind, DecayState, ItemAttributes};
use crate::persistence::prop_stream::{PropStream, PropWriteStream};
use crate::world::item_types::{ItemType, ItemTypeRegistry};

/// Attribute tags used inside an item's property blob.
pub mod attr_tag {
    pub const END: u8 = 0;
    pub const DESCRIPTION: u8 = 1;
    pub const EXT_FILE: u8 = 2;
    pub const TILE_FLAGS: u8 = 3;
    pub const ACTION_ID: u8 = 4;
    pub const UNIQUE_ID: u8 = 5;
    pub const TEXT: u8 = 6;
    pub const DESC: u8 = 7;
    pub const TELE_DEST: u8 = 8;
    pub const ITEM: u8 = 9;
    pub const DEPOT_ID: u8 = 10;
    pub const EXT_SPAWN_FILE: u8 = 11;
    pub const RUNE_CHARGES: u8 = 12;
    pub const EXT_HOUSE_FILE: u8 = 13;
    pub const HOUSE_DOOR_ID: u8 = 14;
    pub const COUNT: u8 = 15;
    pub const DURATION: u8 = 16;
    pub const DECAYING_STATE: u8 = 17;
    pub const WRITTEN_DATE: u8 = 18;
    pub const WRITTEN_BY: u8 = 19;
    pub const SLEEPER_GUID: u8 = 20;
    pub const SLEEP_START: u8 = 21;
    pub const CHARGES: u8 = 22;
    pub const CONTAINER_ITEMS: u8 = 23;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttrReadError {
    #[error("attribute {tag} truncated")]
    Truncated { tag: u8 },
    #[error("unknown attribute tag {tag}")]
    UnknownTag { tag: u8 },
    #[error("item id missing")]
    MissingId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrReadOutcome {
    /// Terminator or end of stream reached.
    Complete,
    /// A container item count was read; child item data follows.
    ContainerFollows(u32),
}

/// A concrete item instance: type id, stack count and attribute bag.
///
/// Static data (stackable, charges, decay) is always looked up in the
/// registry the caller passes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: u16,
    count: u8,
    attributes: ItemAttributes,
}

impl Item {
    pub fn new(types: &ItemTypeRegistry, id: u16, amount: u16) -> Self {
        let mut item = Self {
            id,
            count: 0,
            attributes: ItemAttributes::new(),
        };
        let it = types.get_or_default(id);
        item.set_item_count(1);

        if it.is_fluid_container() || it.is_splash() {
            item.attributes.set_fluid_type(amount);
        } else if it.stackable {
            if amount != 0 {
                item.set_item_count(amount as u8);
            } else if it.charges != 0 {
                item.set_item_count(it.charges as u8);
            }
        } else if it.charges != 0 {
            if amount > 1 {
                item.attributes.set_charges(amount);
            } else {
                item.attributes.set_charges(it.charges as u16);
            }
        }

        item.set_default_duration(it);
        item
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn attributes(&self) -> &ItemAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ItemAttributes {
        &mut self.attributes
    }

    /// Raw stored count; a single item is stored as 0.
    pub fn item_count(&self) -> u8 {
        self.count
    }

    pub fn set_item_count(&mut self, n: u8) {
        self.count = if n > 1 { n } else { 0 };
    }

    pub fn sub_type(&self, types: &ItemTypeRegistry) -> u16 {
        let it = types.get_or_default(self.id);
        if it.is_fluid_container() || it.is_splash() {
            self.attributes.fluid_type()
        } else if it.stackable {
            u16::from(self.count)
        } else if it.charges != 0 {
            self.attributes.charges()
        } else {
            u16::from(self.count)
        }
    }

    pub fn set_sub_type(&mut self, types: &ItemTypeRegistry, n: u16) {
        let it = types.get_or_default(self.id);
        if it.is_fluid_container() || it.is_splash() {
            self.attributes.set_fluid_type(n);
        } else if it.charges != 0 && !it.stackable {
            self.attributes.set_charges(n);
        } else {
            self.set_item_count(n as u8);
        }
    }

    pub fn set_default_subtype(&mut self, types: &ItemTypeRegistry) {
        let it = types.get_or_default(self.id);
        self.set_item_count(1);
        if it.charges != 0 {
            if it.stackable {
                self.set_item_count(it.charges as u8);
            } else {
                self.attributes.set_charges(it.charges as u16);
            }
        }
    }

    fn set_default_duration(&mut self, it: &ItemType) {
        let duration = it.decay_millis();
        if duration != 0 {
            self.attributes.set_duration(duration);
        }
    }

    /// Transforms the item into another type, resetting decay bookkeeping.
    pub fn set_id(&mut self, types: &ItemTypeRegistry, new_id: u16) {
        let prev_stop_time = types.get_or_default(self.id).stop_time;
        self.id = new_id;
        let it = types.get_or_default(new_id);
        let new_duration = it.decay_millis();

        if new_duration == 0 && !it.stop_time && it.decay_to.is_none() {
            self.attributes.remove_attribute(AttributeKind::Decaying);
            self.attributes.remove_attribute(AttributeKind::Duration);
        }

        self.attributes.remove_attribute(AttributeKind::CorpseOwner);

        if new_duration > 0
            && (!prev_stop_time || !self.attributes.has_attribute(AttributeKind::Duration))
        {
            self.attributes.set_decaying(DecayState::False);
            self.attributes.set_duration(new_duration);
        }
    }

    /// Only the first unique id sticks.
    pub fn set_unique_id(&mut self, value: u16) {
        if self.attributes.unique_id() != 0 {
            return;
        }
        self.attributes.set_unique_id(value);
    }

    pub fn can_decay(&self, types: &ItemTypeRegistry) -> bool {
        if self.attributes.unique_id() != 0 {
            return false;
        }
        let it = types.get_or_default(self.id);
        it.decay_to.is_some() && it.decay_time_secs != 0
    }

    /// Takes over `other`'s attributes except its decay state.
    pub fn copy_attributes(&mut self, other: &Item) {
        self.attributes = other.attributes.clone();
        self.attributes.remove_attribute(AttributeKind::Decaying);
        self.attributes.remove_attribute(AttributeKind::Duration);
    }

    pub fn is_stackable(&self, types: &ItemTypeRegistry) -> bool {
        types.get_or_default(self.id).stackable
    }

    pub fn has_charges(&self, types: &ItemTypeRegistry) -> bool {
        types.get_or_default(self.id).has_charges()
    }

    pub fn serialize_attr(&self, types: &ItemTypeRegistry, out: &mut PropWriteStream) {
        let it = types.get_or_default(self.id);
        if it.stackable || it.is_fluid_container() || it.is_splash() {
            out.add_u8(attr_tag::COUNT);
            out.add_u8(self.sub_type(types) as u8);
        }

        if it.has_charges() {
            out.add_u8(attr_tag::CHARGES);
            out.add_u16(self.attributes.charges());
        }

        if it.moveable {
            let action_id = self.attributes.action_id();
            if action_id != 0 {
                out.add_u8(attr_tag::ACTION_ID);
                out.add_u16(action_id);
            }
        }

        let text = self.attributes.text();
        if !text.is_empty() {
            out.add_u8(attr_tag::TEXT);
            out.add_string(text);
        }

        let written_date = self.attributes.written_date();
        if written_date > 0 {
            out.add_u8(attr_tag::WRITTEN_DATE);
            out.add_u32(written_date);
        }

        let writer = self.attributes.writer();
        if !writer.is_empty() {
            out.add_u8(attr_tag::WRITTEN_BY);
            out.add_string(writer);
        }

        let description = self.attributes.special_description();
        if !description.is_empty() {
            out.add_u8(attr_tag::DESC);
            out.add_string(description);
        }

        if self.attributes.has_attribute(AttributeKind::Duration) {
            out.add_u8(attr_tag::DURATION);
            out.add_u32(self.attributes.duration() as u32);
        }

        let decaying = self.attributes.decaying();
        if matches!(decaying, DecayState::True | DecayState::Pending) {
            out.add_u8(attr_tag::DECAYING_STATE);
            out.add_u8(decaying as u8);
        }
    }

    /// Reads `(tag, value)` pairs until a zero tag or the end of the stream.
    pub fn unserialize_attr(
        &mut self,
        types: &ItemTypeRegistry,
        props: &mut PropStream<'_>,
    ) -> Result<AttrReadOutcome, AttrReadError> {
        while let Some(tag) = props.get_u8() {
            if tag == attr_tag::END {
                break;
            }
            if let Some(outcome) = self.read_attr(types, tag, props)? {
                return Ok(outcome);
            }
        }
        Ok(AttrReadOutcome::Complete)
    }

    fn read_attr(
        &mut self,
        types: &ItemTypeRegistry,
        tag: u8,
        props: &mut PropStream<'_>,
    ) -> Result<Option<AttrReadOutcome>, AttrReadError> {
        let truncated = AttrReadError::Truncated { tag };
        match tag {
            attr_tag::COUNT | attr_tag::RUNE_CHARGES => {
                let value = props.get_u8().ok_or(truncated)?;
                self.set_sub_type(types, u16::from(value));
            }
            attr_tag::ACTION_ID => {
                let value = props.get_u16().ok_or(truncated)?;
                self.attributes.set_action_id(value);
            }
            attr_tag::UNIQUE_ID => {
                let value = props.get_u16().ok_or(truncated)?;
                self.set_unique_id(value);
            }
            attr_tag::TEXT => {
                let value = props.get_string().ok_or(truncated)?;
                self.attributes.set_text(&value);
            }
            attr_tag::WRITTEN_DATE => {
                let value = props.get_u32().ok_or(truncated)?;
                self.attributes.set_written_date(value);
            }
            attr_tag::WRITTEN_BY => {
                let value = props.get_string().ok_or(truncated)?;
                self.attributes.set_writer(&value);
            }
            attr_tag::DESC => {
                let value = props.get_string().ok_or(truncated)?;
                self.attributes.set_special_description(&value);
            }
            attr_tag::CHARGES => {
                let value = props.get_u16().ok_or(truncated)?;
                self.set_sub_type(types, value);
            }
            attr_tag::DURATION => {
                let value = props.get_i32().ok_or(truncated)?;
                self.attributes.set_duration(value.max(0));
            }
            attr_tag::DECAYING_STATE => {
                let value = props.get_u8().ok_or(truncated)?;
                if value != DecayState::False as u8 {
                    self.attributes.set_decaying(DecayState::Pending);
                }
            }
            // Tags owned by derived item kinds: consume and ignore.
            attr_tag::DEPOT_ID => {
                props.skip(2).ok_or(truncated)?;
            }
            attr_tag::HOUSE_DOOR_ID => {
                props.skip(1).ok_or(truncated)?;
            }
            attr_tag::SLEEPER_GUID | attr_tag::SLEEP_START => {
                props.skip(4).ok_or(truncated)?;
            }
            attr_tag::TELE_DEST => {
                props.skip(5).ok_or(truncated)?;
            }
            attr_tag::CONTAINER_ITEMS => {
                let count = props.get_u32().ok_or(truncated)?;
                return Ok(Some(AttrReadOutcome::ContainerFollows(count)));
            }
            other => return Err(AttrReadError::UnknownTag { tag: other }),
        }
        Ok(None)
    }

    /// Id followed by attributes, terminated by a zero tag.
    pub fn serialize(&self, types: &ItemTypeRegistry, out: &mut PropWriteStream) {
        out.add_u16(self.id);
        self.serialize_attr(types, out);
        out.add_u8(attr_tag::END);
    }

    pub fn create_from_stream(
        types: &ItemTypeRegistry,
        props: &mut PropStream<'_>,
    ) -> Result<(Self, AttrReadOutcome), AttrReadError> {
        let id = props.get_u16().ok_or(AttrReadError::MissingId)?;
        let mut item = Self::new(types, id, 0);
        let outcome = item.unserialize_attr(types, props)?;
        Ok((item, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::item_types::{ItemGroup, ItemType};

    const COINS: u16 = 2148;
    const POTION: u16 = 2006;
    const WAND: u16 = 2190;
    const TORCH_LIT: u16 = 2051;
    const TORCH_OUT: u16 = 2050;
    const LETTER: u16 = 2597;

    fn registry() -> ItemTypeRegistry {
        let mut types = ItemTypeRegistry::new();
        for item in [
            ItemType {
                id: COINS,
                name: "gold coin".into(),
                stackable: true,
                ..ItemType::default()
            },
            ItemType {
                id: POTION,
                name: "vial".into(),
                group: ItemGroup::Fluid,
                ..ItemType::default()
            },
            ItemType {
                id: WAND,
                name: "wand".into(),
                charges: 50,
                ..ItemType::default()
            },
            ItemType {
                id: TORCH_LIT,
                name: "lit torch".into(),
                decay_to: Some(TORCH_OUT),
                decay_time_secs: 600,
                stop_time: true,
                ..ItemType::default()
            },
            ItemType {
                id: TORCH_OUT,
                name: "burnt torch".into(),
                ..ItemType::default()
            },
            ItemType {
                id: LETTER,
                name: "letter".into(),
                group: ItemGroup::Writeable,
                ..ItemType::default()
            },
        ] {
            types.insert(item).expect("insert");
        }
        types
    }

    #[test]
    fn stack_count_uses_zero_for_single_item() {
        let types = registry();
        let mut coins = Item::new(&types, COINS, 5);
        assert_eq!(coins.sub_type(&types), 5);
        coins.set_item_count(1);
        assert_eq!(coins.sub_type(&types), 0);
        assert_eq!(coins.item_count(), 0);
    }

    #[test]
    fn constructor_picks_subtype_by_kind() {
        let types = registry();
        let vial = Item::new(&types, POTION, 7);
        assert_eq!(vial.sub_type(&types), 7);
        assert_eq!(vial.item_count(), 0);

        let wand = Item::new(&types, WAND, 1);
        assert_eq!(wand.sub_type(&types), 50);
        let wand = Item::new(&types, WAND, 12);
        assert_eq!(wand.sub_type(&types), 12);

        let torch = Item::new(&types, TORCH_LIT, 0);
        assert_eq!(torch.attributes().duration(), 600_000);
        assert!(torch.can_decay(&types));
    }

    #[test]
    fn set_id_resets_decay_state() {
        let types = registry();
        let mut torch = Item::new(&types, TORCH_LIT, 0);
        torch.attributes_mut().set_decaying(DecayState::True);
        torch.attributes_mut().set_corpse_owner(44);
        torch.set_id(&types, TORCH_OUT);
        assert_eq!(torch.id(), TORCH_OUT);
        assert!(!torch.attributes().has_attribute(AttributeKind::Decaying));
        assert!(!torch.attributes().has_attribute(AttributeKind::Duration));
        assert!(!torch.attributes().has_attribute(AttributeKind::CorpseOwner));

        torch.set_id(&types, TORCH_LIT);
        assert_eq!(torch.attributes().decaying(), DecayState::False);
        assert_eq!(torch.attributes().duration(), 600_000);
    }

    #[test]
    fn unique_id_blocks_decay_and_is_write_once() {
        let types = registry();
        let mut torch = Item::new(&types, TORCH_LIT, 0);
        torch.set_unique_id(2000);
        torch.set_unique_id(3000);
        assert_eq!(torch.attributes().unique_id(), 2000);
        assert!(!torch.can_decay(&types));
    }

    #[test]
    fn copy_attributes_drops_decay() {
        let types = registry();
        let mut source = Item::new(&types, TORCH_LIT, 0);
        source.attributes_mut().set_text("burning");
        let mut target = Item::new(&types, TORCH_OUT, 0);
        target.copy_attributes(&source);
        assert_eq!(target.attributes().text(), "burning");
        assert!(!target.attributes().has_attribute(AttributeKind::Duration));
        source.attributes_mut().set_text("changed");
        assert_eq!(target.attributes().text(), "burning");
    }

    #[test]
    fn attributes_survive_serialization() {
        let types = registry();
        let mut letter = Item::new(&types, LETTER, 0);
        letter.attributes_mut().set_text("dear friend");
        letter.attributes_mut().set_writer("Avar Tar");
        letter.attributes_mut().set_written_date(1_200_000_000);
        letter.attributes_mut().set_action_id(4500);
        letter.attributes_mut().set_special_description("sealed");

        let mut out = PropWriteStream::new();
        letter.serialize(&types, &mut out);
        let mut props = PropStream::new(out.as_slice());
        let (loaded, outcome) = Item::create_from_stream(&types, &mut props).expect("load");
        assert_eq!(outcome, AttrReadOutcome::Complete);
        assert_eq!(props.remaining(), 0);
        assert_eq!(loaded, letter);
    }

    #[test]
    fn decaying_state_loads_as_pending() {
        let types = registry();
        let mut torch = Item::new(&types, TORCH_LIT, 0);
        torch.attributes_mut().set_decaying(DecayState::True);
        let mut out = PropWriteStream::new();
        torch.serialize(&types, &mut out);
        let mut props = PropStream::new(out.as_slice());
        let (loaded, _) = Item::create_from_stream(&types, &mut props).expect("load");
        assert_eq!(loaded.attributes().decaying(), DecayState::Pending);
    }

    #[test]
    fn negative_duration_is_clamped() {
        let types = registry();
        let mut out = PropWriteStream::new();
        out.add_u8(attr_tag::DURATION);
        out.add_i32(-5);
        out.add_u8(attr_tag::END);
        let mut item = Item::new(&types, TORCH_OUT, 0);
        let mut props = PropStream::new(out.as_slice());
        item.unserialize_attr(&types, &mut props).expect("attrs");
        assert_eq!(item.attributes().duration(), 0);
    }

    #[test]
    fn foreign_tags_are_skipped_and_container_stops() {
        let types = registry();
        let mut out = PropWriteStream::new();
        out.add_u8(attr_tag::TELE_DEST);
        out.add_u16(100);
        out.add_u16(200);
        out.add_u8(7);
        out.add_u8(attr_tag::DEPOT_ID);
        out.add_u16(3);
        out.add_u8(attr_tag::HOUSE_DOOR_ID);
        out.add_u8(9);
        out.add_u8(attr_tag::SLEEPER_GUID);
        out.add_u32(77);
        out.add_u8(attr_tag::CONTAINER_ITEMS);
        out.add_u32(4);
        out.add_u8(attr_tag::TEXT);
        let mut item = Item::new(&types, COINS, 0);
        let mut props = PropStream::new(out.as_slice());
        let outcome = item.unserialize_attr(&types, &mut props).expect("attrs");
        assert_eq!(outcome, AttrReadOutcome::ContainerFollows(4));
        assert_eq!(props.remaining(), 1);
    }

    #[test]
    fn unknown_or_short_tags_fail() {
        let types = registry();
        let mut item = Item::new(&types, COINS, 0);
        let data = [200u8];
        let mut props = PropStream::new(&data);
        assert_eq!(
            item.unserialize_attr(&types, &mut props),
            Err(AttrReadError::UnknownTag { tag: 200 })
        );
        let data = [attr_tag::ACTION_ID, 1];
        let mut props = PropStream::new(&data);
        assert_eq!(
            item.unserialize_attr(&types, &mut props),
            Err(AttrReadError::Truncated {
                tag: attr_tag::ACTION_ID
            })
        );
    }
}
