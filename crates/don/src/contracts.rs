//! Bindings for the DON contracts we interact with.

/// `IFunctionsRouter` bindings.
pub mod i_functions_router {
    #![allow(missing_docs)]

    alloy::sol! {
        #[sol(rpc)]
        contract IFunctionsRouter {
            function getContractById(bytes32 id) external view returns (address);
        }
    }
}

/// `IFunctionsCoordinator` bindings.
pub mod i_functions_coordinator {
    #![allow(missing_docs)]

    alloy::sol! {
        #[sol(rpc)]
        contract IFunctionsCoordinator {
            function getThresholdPublicKey() external view returns (bytes memory);
        }
    }
}
