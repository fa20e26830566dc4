//! Typed identifiers
//!
//! Each shape is declared with [`crate::resource_id!`]: the schema as data
//! plus the mapping from segment names to struct fields.

use super::segment::{
    Segment, RESOURCE_GROUP_NAME, STATIC_PROVIDERS, STATIC_RESOURCE_GROUPS, STATIC_SUBSCRIPTIONS,
    SUBSCRIPTION_ID,
};

/// Declare a typed identifier.
///
/// ```ignore
/// armctl::resource_id! {
///     /// A key vault.
///     pub struct KeyVaultId {
///         kind: "key vault",
///         segments: [
///             STATIC_SUBSCRIPTIONS, SUBSCRIPTION_ID,
///             STATIC_RESOURCE_GROUPS, RESOURCE_GROUP_NAME, STATIC_PROVIDERS,
///             Segment::provider("staticMicrosoftKeyVault", "Microsoft.KeyVault"),
///             Segment::static_segment("staticVaults", "vaults"),
///             Segment::user_specified("vaultName", "example-vault"),
///         ],
///         fields: {
///             subscription_id => "subscriptionId",
///             resource_group_name => "resourceGroupName",
///             vault_name => "vaultName",
///         },
///     }
/// }
/// ```
#[macro_export]
macro_rules! resource_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            kind: $kind:literal,
            segments: [ $($segment:expr),+ $(,)? ],
            fields: { $($field:ident => $key:literal),+ $(,)? } $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            $(pub $field: String,)+
        }

        impl $name {
            /// Build from trusted values. Use `try_new` for anything that
            /// may be empty or contain `/`.
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: impl Into<String>),+) -> Self {
                Self {
                    $($field: $field.into(),)+
                }
            }

            /// Build and check that the identifier parses back to itself.
            #[allow(clippy::too_many_arguments)]
            pub fn try_new(
                $($field: impl Into<String>),+
            ) -> ::std::result::Result<Self, $crate::error::MalformedIdentifier> {
                let id = Self::new($($field),+);
                $crate::resourceid::ResourceId::check(&id)?;
                Ok(id)
            }
        }

        impl $crate::resourceid::ResourceId for $name {
            const RESOURCE_KIND: &'static str = $kind;

            fn schema() -> $crate::resourceid::Schema {
                const SEGMENTS: &[$crate::resourceid::Segment] = &[$($segment),+];
                $crate::resourceid::Schema::new(SEGMENTS)
            }

            fn from_parsed(
                parsed: &$crate::resourceid::ParsedId,
            ) -> ::std::result::Result<Self, $crate::error::MalformedIdentifier> {
                Ok(Self {
                    $($field: parsed.require($key)?.to_string(),)+
                })
            }

            fn segment_value(&self, segment: &str) -> Option<&str> {
                match segment {
                    $($key => Some(self.$field.as_str()),)+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&$crate::resourceid::ResourceId::id(self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::MalformedIdentifier;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                <Self as $crate::resourceid::ResourceId>::parse(s)
            }
        }
    };
}

resource_id! {
    /// `/subscriptions/{subscriptionId}`
    pub struct SubscriptionId {
        kind: "subscription",
        segments: [STATIC_SUBSCRIPTIONS, SUBSCRIPTION_ID],
        fields: {
            subscription_id => "subscriptionId",
        },
    }
}

resource_id! {
    /// `/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}`
    pub struct ResourceGroupId {
        kind: "resource group",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
        },
    }
}

resource_id! {
    /// A virtual network.
    pub struct VirtualNetworkId {
        kind: "virtual network",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftNetwork", "Microsoft.Network"),
            Segment::static_segment("staticVirtualNetworks", "virtualNetworks"),
            Segment::user_specified("virtualNetworkName", "example-vnet"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            virtual_network_name => "virtualNetworkName",
        },
    }
}

resource_id! {
    /// A subnet within a virtual network.
    pub struct SubnetId {
        kind: "subnet",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftNetwork", "Microsoft.Network"),
            Segment::static_segment("staticVirtualNetworks", "virtualNetworks"),
            Segment::user_specified("virtualNetworkName", "example-vnet"),
            Segment::static_segment("staticSubnets", "subnets"),
            Segment::user_specified("subnetName", "example-subnet"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            virtual_network_name => "virtualNetworkName",
            subnet_name => "subnetName",
        },
    }
}

impl SubnetId {
    /// The virtual network this subnet belongs to.
    pub fn virtual_network_id(&self) -> VirtualNetworkId {
        VirtualNetworkId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.virtual_network_name,
        )
    }
}

resource_id! {
    /// A network profile used by container groups deployed into a subnet.
    pub struct NetworkProfileId {
        kind: "network profile",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftNetwork", "Microsoft.Network"),
            Segment::static_segment("staticNetworkProfiles", "networkProfiles"),
            Segment::user_specified("networkProfileName", "example-profile"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            network_profile_name => "networkProfileName",
        },
    }
}

resource_id! {
    /// A container group.
    pub struct ContainerGroupId {
        kind: "container group",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftContainerInstance", "Microsoft.ContainerInstance"),
            Segment::static_segment("staticContainerGroups", "containerGroups"),
            Segment::user_specified("containerGroupName", "example-group"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            container_group_name => "containerGroupName",
        },
    }
}

resource_id! {
    /// A key vault.
    pub struct KeyVaultId {
        kind: "key vault",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftKeyVault", "Microsoft.KeyVault"),
            Segment::static_segment("staticVaults", "vaults"),
            Segment::user_specified("vaultName", "example-vault"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            vault_name => "vaultName",
        },
    }
}

resource_id! {
    /// A virtual machine.
    pub struct VirtualMachineId {
        kind: "virtual machine",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftCompute", "Microsoft.Compute"),
            Segment::static_segment("staticVirtualMachines", "virtualMachines"),
            Segment::user_specified("virtualMachineName", "example-vm"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            virtual_machine_name => "virtualMachineName",
        },
    }
}

resource_id! {
    /// An IoT hub.
    pub struct IotHubId {
        kind: "iot hub",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftDevices", "Microsoft.Devices"),
            Segment::static_segment("staticIotHubs", "iotHubs"),
            Segment::user_specified("iotHubName", "example-hub"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            iot_hub_name => "iotHubName",
        },
    }
}

resource_id! {
    /// A storage account.
    pub struct StorageAccountId {
        kind: "storage account",
        segments: [
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftStorage", "Microsoft.Storage"),
            Segment::static_segment("staticStorageAccounts", "storageAccounts"),
            Segment::user_specified("storageAccountName", "examplestorage"),
        ],
        fields: {
            subscription_id => "subscriptionId",
            resource_group_name => "resourceGroupName",
            storage_account_name => "storageAccountName",
        },
    }
}
