//! Attribute system.
//!
//! This module provides typed access to per-element data on geometry:
//! - [`AttrDomain`] / [`DataType`] / [`AttributeType`] - Domains and value types
//! - [`VArray`] / [`VMutableArray`] - Virtual arrays over any storage
//! - [`GArray`] / [`GVArray`] / [`GVMutableArray`] - Type-erased containers
//! - [`SegmentedView`] / [`OffsetIndices`] - Flat views over per-substructure buffers
//! - [`CustomData`] - Named layers stored as owned arrays
//! - [`ComponentAttributeProviders`] - Builtin and dynamic providers per geometry type
//! - [`AttributeAccessor`] / [`MutableAttributeAccessor`] - Uniform access front-end

mod types;
mod index_mask;
mod segmented;
mod varray;
mod generic;
mod mixer;
mod id;
mod custom_data;
mod provider;
mod accessor;

pub(crate) use generic::{gconvert, gdispatch};

pub use types::{
    data_type_highest_complexity, domain_highest_priority, AttrDomain, AttributeType, ColorGeometry4f,
    DataType,
};
pub use index_mask::{IndexMask, IndexMaskIter};
pub use segmented::{OffsetIndices, SegmentedView, SegmentedViewMut};
pub use varray::{DerivedSpan, DerivedSpanMut, VArray, VArrayImpl, VArrayIter, VMutableArray, VMutableArrayImpl};
pub use generic::{GArray, GVArray, GVMutableArray};
pub use mixer::{all_true_segments, mix_segments, DefaultMixer};
pub use id::{
    AnonymousAttributePropagationInfo, AttributeId, AttributeInit, AttributeMetaData, ANONYMOUS_PREFIX,
    INTERNAL_PREFIX,
};
pub use custom_data::{CustomData, CustomDataLayer};
pub use provider::{
    AttributeReader, AttributeWriter, BuiltinAttributeProvider, BuiltinCustomDataProvider, BuiltinInfo,
    ChangeListener, ComponentAttributeProviders, ComputedProvider, CustomDataAttributeProvider,
    CustomDataOwner, DerivedArrayProvider, DynamicAttributesProvider, FinishCallback, GAttributeReader,
    GAttributeWriter,
};
pub(crate) use provider::create_layer;
pub use accessor::{AttributeAccessor, AttributeAccessorFunctions, AttributeOwner, MutableAttributeAccessor};
