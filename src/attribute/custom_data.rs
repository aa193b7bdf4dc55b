//! Named attribute layers stored as owned arrays.

use super::{AttributeId, AttributeType, DataType, GArray};

/// One named layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDataLayer {
    pub id: AttributeId,
    pub data: GArray,
}

/// Ordered set of named layers that all share one element count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    layers: Vec<CustomDataLayer>,
}

impl CustomData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[CustomDataLayer] {
        &self.layers
    }

    pub fn layers_num(&self) -> usize {
        self.layers.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == name)
    }

    pub fn get(&self, name: &str) -> Option<&GArray> {
        self.layers.iter().find(|layer| layer.id == name).map(|layer| &layer.data)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GArray> {
        self.layers
            .iter_mut()
            .find(|layer| layer.id == name)
            .map(|layer| &mut layer.data)
    }

    /// Typed layer values, `None` if missing or of another type.
    pub fn typed<T: AttributeType>(&self, name: &str) -> Option<&[T]> {
        self.get(name)?.typed::<T>()
    }

    pub fn typed_mut<T: AttributeType>(&mut self, name: &str) -> Option<&mut [T]> {
        self.get_mut(name)?.typed_mut::<T>().map(Vec::as_mut_slice)
    }

    /// Add a layer. Returns false if the name is taken.
    pub fn add(&mut self, id: AttributeId, data: GArray) -> bool {
        if self.contains(id.name()) {
            return false;
        }
        self.layers.push(CustomDataLayer { id, data });
        true
    }

    /// Add a layer of `len` default values.
    pub fn add_default(&mut self, id: AttributeId, data_type: DataType, len: usize) -> bool {
        self.add(id, GArray::new(data_type, len))
    }

    /// Remove a layer. Returns false if it did not exist.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(index) => {
                self.layers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take a layer out, keeping the others in order.
    pub fn take(&mut self, name: &str) -> Option<GArray> {
        let index = self.index_of(name)?;
        Some(self.layers.remove(index).data)
    }

    /// Resize every layer to `len` elements.
    pub fn resize(&mut self, len: usize) {
        for layer in &mut self.layers {
            layer.data.resize(len);
        }
    }

    /// Names and types of the layers, in order.
    pub fn signature(&self) -> Vec<(AttributeId, DataType)> {
        self.layers
            .iter()
            .map(|layer| (layer.id.clone(), layer.data.data_type()))
            .collect()
    }

    /// Total memory used by the layer values.
    pub fn byte_size(&self) -> usize {
        self.layers.iter().map(|layer| layer.data.byte_size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut data = CustomData::new();
        assert!(data.add_default("weight".into(), DataType::Float, 3));
        assert!(!data.add_default("weight".into(), DataType::Int32, 3));
        assert_eq!(data.typed::<f32>("weight"), Some(&[0.0, 0.0, 0.0][..]));
        assert!(data.typed::<i32>("weight").is_none());

        data.resize(5);
        assert_eq!(data.get("weight").map(GArray::len), Some(5));

        assert!(data.remove("weight"));
        assert!(!data.remove("weight"));
        assert_eq!(data.layers_num(), 0);
    }

    #[test]
    fn test_signature_order() {
        let mut data = CustomData::new();
        data.add_default("b".into(), DataType::Bool, 1);
        data.add_default("a".into(), DataType::Float3, 1);
        let names: Vec<_> = data.signature().into_iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(data.byte_size(), 13);
    }
}
