use std::any::type_name;

use crate::filter::{Buffer, Filter};
use crate::{Error, Message};

#[doc(hidden)]
pub trait FilterInternal: Send {
    fn feed_internal(&mut self, msg: Message) -> Result<(), Error>;
    fn decode_internal(&mut self) -> Result<Option<Message>, Error>;
    fn encode_internal(&mut self, msg: Message) -> Result<Message, Error>;
    fn buffered_internal(&self) -> bool;
    fn name(&self) -> &str;
}

/// Type-erased wrapper that owns a filter together with its pending input.
pub(crate) struct FilterStage<F: Filter> {
    name: String,
    filter: F,
    pending: F::Inner,
}

impl<F: Filter> FilterStage<F> {
    pub(crate) fn new(filter: F) -> Self {
        Self {
            name: filter.name().to_owned(),
            filter,
            pending: F::Inner::default(),
        }
    }
}

impl<F: Filter> FilterInternal for FilterStage<F> {
    fn feed_internal(&mut self, msg: Message) -> Result<(), Error> {
        match msg.downcast::<<F::Inner as Buffer>::Item>() {
            Ok(item) => {
                self.pending.push(*item);
                Ok(())
            }
            Err(_) => Err(Error::decode(
                &self.name,
                format!(
                    "input is not {}",
                    type_name::<<F::Inner as Buffer>::Item>()
                ),
            )),
        }
    }

    fn decode_internal(&mut self) -> Result<Option<Message>, Error> {
        let item = self.filter.decode(&mut self.pending)?;
        Ok(item.map(|item| Box::new(item) as Message))
    }

    fn encode_internal(&mut self, msg: Message) -> Result<Message, Error> {
        match msg.downcast::<F::Outer>() {
            Ok(item) => {
                let inner = self.filter.encode(*item)?;
                Ok(Box::new(inner))
            }
            Err(_) => Err(Error::encode(
                &self.name,
                format!("output is not {}", type_name::<F::Outer>()),
            )),
        }
    }

    fn buffered_internal(&self) -> bool {
        !self.pending.is_empty()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
