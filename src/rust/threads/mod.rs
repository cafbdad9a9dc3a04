// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod alarm;
pub mod condition;
pub mod lock;
pub mod policy;
pub mod queue;
pub mod table;
pub mod wait_set;
