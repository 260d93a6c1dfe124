//! Serialization of floating-point tensor buffers
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, Bytes, DeserializeAs, SerializeAs};
use std::borrow::Cow;
use tch::{Kind, Tensor};

/// Floating point element kinds that a buffer may hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatKind {
    Float,
    Double,
}

impl TryFrom<Kind> for FloatKind {
    type Error = Kind;

    fn try_from(kind: Kind) -> Result<Self, Self::Error> {
        match kind {
            Kind::Float => Ok(Self::Float),
            Kind::Double => Ok(Self::Double),
            kind => Err(kind),
        }
    }
}

impl From<FloatKind> for Kind {
    fn from(kind: FloatKind) -> Self {
        match kind {
            FloatKind::Float => Self::Float,
            FloatKind::Double => Self::Double,
        }
    }
}

/// System byte order serialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Native byte order for this system
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }
}

/// Serialization definition for a floating point buffer [`Tensor`].
///
/// Use `#[serde_as(as = "BufferDef")]` on a field of type [`Tensor`].
/// Buffers never track gradients; the deserialized tensor lives in CPU memory.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferDef<'a> {
    pub kind: FloatKind,
    #[serde(borrow)]
    pub shape: Cow<'a, [i64]>,
    pub byte_order: ByteOrder,
    #[serde_as(as = "Bytes")]
    #[serde(borrow)]
    pub data: Cow<'a, [u8]>,
}

impl<'a> TryFrom<&'_ Tensor> for BufferDef<'a> {
    type Error = Kind;

    /// Copy the data of a `Float` or `Double` tensor.
    fn try_from(tensor: &Tensor) -> Result<Self, Self::Error> {
        let kind = FloatKind::try_from(tensor.kind())?;
        // Expanded buffers are strided views; copy out a dense version.
        let tensor = tensor.detach().to_device(tch::Device::Cpu).contiguous();
        let shape = tensor.size();
        let num_elements: usize = shape.iter().product::<i64>().try_into().unwrap_or(0);

        let mut data = vec![0; num_elements * Kind::from(kind).elt_size_in_bytes()];
        tensor.copy_data_u8(&mut data, num_elements);

        Ok(Self {
            kind,
            shape: Cow::Owned(shape),
            byte_order: ByteOrder::native(),
            data: Cow::Owned(data),
        })
    }
}

impl<'a> BufferDef<'a> {
    /// Create a CPU tensor by copying the buffer data.
    ///
    /// # Errors
    /// If the byte order is not native or the data length does not match the shape.
    pub fn to_tensor(&self) -> Result<Tensor, String> {
        if self.byte_order != ByteOrder::native() {
            return Err(format!(
                "buffer has byte order {:?}, expected {:?}",
                self.byte_order,
                ByteOrder::native()
            ));
        }
        let kind = Kind::from(self.kind);
        let num_elements: i64 = self.shape.iter().product();
        let expected_len = usize::try_from(num_elements)
            .map_err(|_| format!("invalid buffer shape {:?}", self.shape))?
            * kind.elt_size_in_bytes();
        if self.data.len() != expected_len {
            return Err(format!(
                "buffer of shape {:?} needs {} bytes, got {}",
                self.shape,
                expected_len,
                self.data.len()
            ));
        }
        Ok(Tensor::of_data_size(&self.data, &self.shape, kind))
    }
}

impl<'a> SerializeAs<Tensor> for BufferDef<'a> {
    fn serialize_as<S>(source: &Tensor, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BufferDef::try_from(source)
            .map_err(|kind| ser::Error::custom(format!("cannot serialize {kind:?} buffer")))?
            .serialize(serializer)
    }
}

impl<'de: 'a, 'a> DeserializeAs<'de, Tensor> for BufferDef<'a> {
    fn deserialize_as<D>(deserializer: D) -> Result<Tensor, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buffer: BufferDef = Deserialize::deserialize(deserializer)?;
        buffer.to_tensor().map_err(de::Error::custom)
    }
}
